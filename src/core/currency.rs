//! Supported currencies and their upstream identifiers

use serde::Serialize;
use std::fmt::Display;

/// Fiat tickers mapped to their Central Bank of Russia identifiers.
pub static FIAT_CURRENCIES: [(&str, &str); 10] = [
    ("USD", "R01235"),
    ("EUR", "R01239"),
    ("GBP", "R01035"),
    ("JPY", "R01820"),
    ("CNY", "R01375"),
    ("CHF", "R01775"),
    ("AUD", "R01010"),
    ("CAD", "R01350"),
    ("NOK", "R01535"),
    ("SEK", "R01770"),
];

/// Crypto tickers mapped to their CoinGecko coin ids.
pub static CRYPTO_CURRENCIES: [(&str, &str); 10] = [
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("BNB", "binancecoin"),
    ("XRP", "ripple"),
    ("ADA", "cardano"),
    ("SOL", "solana"),
    ("DOGE", "dogecoin"),
    ("DOT", "polkadot"),
    ("MATIC", "matic-network"),
    ("LTC", "litecoin"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Fiat,
    Crypto,
}

impl Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetClass::Fiat => write!(f, "fiat"),
            AssetClass::Crypto => write!(f, "crypto"),
        }
    }
}

/// A supported currency: its ticker, the id the upstream knows it by, and its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Currency {
    pub code: &'static str,
    pub provider_id: &'static str,
    pub class: AssetClass,
}

impl Currency {
    pub fn fiat(code: &str) -> Option<Self> {
        find(&FIAT_CURRENCIES, code, AssetClass::Fiat)
    }

    pub fn crypto(code: &str) -> Option<Self> {
        find(&CRYPTO_CURRENCIES, code, AssetClass::Crypto)
    }

    /// Resolves a ticker against both sets. Matching is exact.
    pub fn lookup(code: &str) -> Option<Self> {
        Self::fiat(code).or_else(|| Self::crypto(code))
    }

    pub fn all_fiat() -> impl Iterator<Item = Currency> {
        FIAT_CURRENCIES.iter().map(|&(code, id)| Currency {
            code,
            provider_id: id,
            class: AssetClass::Fiat,
        })
    }

    pub fn all_crypto() -> impl Iterator<Item = Currency> {
        CRYPTO_CURRENCIES.iter().map(|&(code, id)| Currency {
            code,
            provider_id: id,
            class: AssetClass::Crypto,
        })
    }

    pub fn is_crypto(&self) -> bool {
        self.class == AssetClass::Crypto
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)
    }
}

fn find(
    table: &'static [(&'static str, &'static str)],
    code: &str,
    class: AssetClass,
) -> Option<Currency> {
    table
        .iter()
        .find(|(ticker, _)| *ticker == code)
        .map(|&(ticker, id)| Currency {
            code: ticker,
            provider_id: id,
            class,
        })
}
