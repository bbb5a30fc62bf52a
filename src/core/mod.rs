//! Core business logic abstractions

pub mod config;
pub mod currency;
pub mod log;
pub mod range;
pub mod rate;

// Re-export main types for cleaner imports
pub use currency::{AssetClass, Currency};
pub use range::{DateRange, Period, RangeError};
pub use rate::{CryptoRateProvider, FiatRateProvider, RateHistory, RateSample};
