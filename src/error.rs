//! Unified error types for the decision engine.

use rust_decimal::Decimal;
use thiserror::Error;

/// Unified error type for the decision engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration values failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A single listing could not be evaluated.
    #[error("listing error: {0}")]
    Listing(#[from] ListingError),

    /// A collaborator the whole run depends on is unavailable.
    #[error("upstream error: {0}")]
    Upstream(#[from] OracleError),

    /// Storage adapter error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-listing input errors. The affected listing is skipped; the run continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ListingError {
    /// Observed price is zero or negative.
    #[error("listing {listing_id}: non-positive price {price}")]
    NonPositivePrice {
        /// Listing reference.
        listing_id: i64,
        /// Offending price.
        price: Decimal,
    },

    /// Price is positive but outside the evaluable range.
    #[error("listing {listing_id}: price {price} out of range")]
    PriceOutOfRange {
        /// Listing reference.
        listing_id: i64,
        /// Offending price.
        price: Decimal,
    },

    /// A RAM or SSD spec string could not be mapped to a component key.
    #[error("listing {listing_id}: malformed component spec: {source}")]
    MalformedComponentSpec {
        /// Listing reference.
        listing_id: i64,
        /// Underlying key error.
        #[source]
        source: ComponentKeyError,
    },

    /// Neither a stored product hash nor brand/CPU/screen were supplied.
    #[error("listing {listing_id}: no product identity could be derived")]
    MissingIdentity {
        /// Listing reference.
        listing_id: i64,
    },
}

impl ListingError {
    /// The listing this error refers to.
    pub fn listing_id(&self) -> i64 {
        match self {
            ListingError::NonPositivePrice { listing_id, .. }
            | ListingError::PriceOutOfRange { listing_id, .. }
            | ListingError::MalformedComponentSpec { listing_id, .. }
            | ListingError::MissingIdentity { listing_id } => *listing_id,
        }
    }
}

/// Component key parsing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComponentKeyError {
    /// Key does not have the `KIND_SUBTYPE_CAPACITY` shape.
    #[error("malformed component key {0:?}")]
    Malformed(String),

    /// Unknown component kind prefix.
    #[error("unknown component kind {0:?}")]
    UnknownKind(String),

    /// Unknown memory or storage subtype.
    #[error("unknown component subtype {0:?}")]
    UnknownSubtype(String),

    /// Capacity is missing its unit or is not a number.
    #[error("malformed capacity {0:?}")]
    Capacity(String),
}

/// Errors from the component index or historical price oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The collaborator cannot be reached at all for this run.
    #[error("{source_name} unavailable: {reason}")]
    Unavailable {
        /// Which collaborator failed.
        source_name: &'static str,
        /// Reason for failure.
        reason: String,
    },
}

/// Storage adapter errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value could not be decoded.
    #[error("failed to decode stored value: {0}")]
    Decode(String),

    /// The backend refused the write.
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, EngineError>;
