pub mod client;
pub mod comfy_table;
pub mod filter_utils;
pub mod find_tickers;
pub mod klines;
pub mod logger;
pub mod pacer;
pub mod price_change;
pub mod ranking;
pub mod scanner;
pub mod storage_utils;

pub use client::{BlofinClient, MarketData};
pub use scanner::{ScanOptions, ScanRecord, ScanResult, ScanStatus, Scanner};
