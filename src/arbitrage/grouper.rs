//! Cross-retailer grouping of listings by product identity.
//!
//! Groups, retailers within a group, and listings within a retailer all keep
//! first-seen input order so that tie-breaks are reproducible.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use super::calculator::spread_pct;
use crate::listing::{Listing, ProductIdentity};

/// All listings of one product identity.
#[derive(Debug, Clone)]
pub struct ProductGroup<'a> {
    /// Shared identity.
    pub product_id: ProductIdentity,
    /// Member listings in input order.
    pub listings: Vec<&'a Listing>,
}

impl<'a> ProductGroup<'a> {
    /// Distinct retailers, in first-seen order.
    pub fn retailers(&self) -> Vec<&'a str> {
        let mut seen: Vec<&'a str> = Vec::new();
        for listing in &self.listings {
            let retailer = listing.retailer.as_str();
            if !seen.contains(&retailer) {
                seen.push(retailer);
            }
        }
        seen
    }

    /// Listings offered by one retailer.
    pub fn at_retailer<'s>(&'s self, retailer: &'s str) -> impl Iterator<Item = &'a Listing> + 's {
        self.listings
            .iter()
            .copied()
            .filter(move |l| l.retailer == retailer)
    }

    /// Highest-priced listing at a retailer; earliest wins on ties.
    pub fn max_priced_at(&self, retailer: &str) -> Option<&'a Listing> {
        self.at_retailer(retailer)
            .fold(None, |best: Option<&'a Listing>, l| match best {
                Some(b) if b.price >= l.price => Some(b),
                _ => Some(l),
            })
    }

    /// Lowest-priced listing at a retailer; earliest wins on ties.
    pub fn min_priced_at(&self, retailer: &str) -> Option<&'a Listing> {
        self.at_retailer(retailer)
            .fold(None, |best: Option<&'a Listing>, l| match best {
                Some(b) if b.price <= l.price => Some(b),
                _ => Some(l),
            })
    }

    /// Every ordered (source, target) retailer pair with source != target.
    ///
    /// Empty when the group spans fewer than two retailers.
    pub fn retailer_pairs(&self) -> Vec<(&'a str, &'a str)> {
        let retailers = self.retailers();
        let mut pairs = Vec::with_capacity(retailers.len() * retailers.len().saturating_sub(1));
        for &source in &retailers {
            for &target in &retailers {
                if source != target {
                    pairs.push((source, target));
                }
            }
        }
        pairs
    }

    /// Lowest observed price across all retailers.
    pub fn min_price(&self) -> Option<Decimal> {
        self.listings.iter().map(|l| l.price).min()
    }

    /// Highest observed price across all retailers.
    pub fn max_price(&self) -> Option<Decimal> {
        self.listings.iter().map(|l| l.price).max()
    }

    /// (max - min) / min * 100 across the whole group.
    pub fn spread_pct(&self) -> Decimal {
        match (self.min_price(), self.max_price()) {
            (Some(min), Some(max)) => spread_pct(min, max),
            _ => Decimal::ZERO,
        }
    }

    /// Price spread across retailers, or `None` for a single-retailer group.
    pub fn spread(&self) -> Option<ProductSpread> {
        let retailers = self.retailers();
        if retailers.len() < 2 {
            return None;
        }
        Some(ProductSpread {
            product_id: self.product_id.clone(),
            retailers: retailers.into_iter().map(str::to_string).collect(),
            min_price: self.min_price()?,
            max_price: self.max_price()?,
            spread_pct: self.spread_pct(),
        })
    }
}

/// Spreads narrower than this are not worth surfacing.
pub const MIN_SPREAD_PCT: Decimal = Decimal::TEN;

/// Cross-retailer price spread of one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSpread {
    /// Product identity.
    pub product_id: ProductIdentity,
    /// Retailers carrying it, first-seen order.
    pub retailers: Vec<String>,
    /// Lowest observed price.
    pub min_price: Decimal,
    /// Highest observed price.
    pub max_price: Decimal,
    /// (max - min) / min * 100.
    pub spread_pct: Decimal,
}

/// Spreads of at least `min_pct`, widest first (stable on ties), at most `n`.
pub fn top_spreads(spreads: &[ProductSpread], min_pct: Decimal, n: usize) -> Vec<&ProductSpread> {
    let mut ranked: Vec<_> = spreads.iter().filter(|s| s.spread_pct >= min_pct).collect();
    ranked.sort_by(|a, b| b.spread_pct.cmp(&a.spread_pct));
    ranked.truncate(n);
    ranked
}

/// Partition listings by product identity, groups in first-seen order.
pub fn group_by_product(listings: &[Listing]) -> Vec<ProductGroup<'_>> {
    let mut index: HashMap<&ProductIdentity, usize> = HashMap::new();
    let mut groups: Vec<ProductGroup<'_>> = Vec::new();

    for listing in listings {
        match index.get(&listing.product_id) {
            Some(&i) => groups[i].listings.push(listing),
            None => {
                index.insert(&listing.product_id, groups.len());
                groups.push(ProductGroup {
                    product_id: listing.product_id.clone(),
                    listings: vec![listing],
                });
            }
        }
    }

    groups
}
