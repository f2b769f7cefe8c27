pub mod price_service;
pub mod gas_service;

pub use price_service::{ CoinQuote, PriceService };
pub use gas_service::{ GasPrices, GasService };
