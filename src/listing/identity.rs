//! Product identity derivation.
//!
//! Listings of the same physical product collapse onto one identity derived
//! from normalized brand, CPU model and screen size. The inputs come from
//! heuristic title extraction, so two SKUs can collide or one SKU can split
//! across identities; identities are never merged after the fact.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex characters kept from the digest.
const IDENTITY_HEX_LEN: usize = 16;

static INCH_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\s*-?\s*("|''|inch(es)?|in\.?)\s*$"#).expect("static regex"));

/// Stable key for "the same product" across retailers and over time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductIdentity(String);

impl ProductIdentity {
    /// Derive an identity from brand, CPU model and screen size.
    pub fn derive(brand: &str, cpu_model: &str, screen_size: &str) -> Self {
        let material = format!(
            "{}|{}|{}",
            normalize(brand),
            normalize(cpu_model),
            normalize_screen(screen_size)
        );
        let digest = Sha256::digest(material.as_bytes());
        let mut hash = hex::encode(digest);
        hash.truncate(IDENTITY_HEX_LEN);
        Self(hash)
    }

    /// Adopt an identity that was already derived and stored.
    pub fn from_stored(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// The identity as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn normalize_screen(s: &str) -> String {
    normalize(&INCH_SUFFIX_RE.replace(s.trim(), ""))
}
