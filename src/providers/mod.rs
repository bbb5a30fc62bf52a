pub mod cbr;
pub mod coingecko;

pub use cbr::CbrProvider;
pub use coingecko::CoinGeckoProvider;
