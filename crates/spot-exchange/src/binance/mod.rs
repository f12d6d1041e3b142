//! Binance Spot 어댑터와 응답 정규화.

mod client;
mod payload;

pub use client::{
    BinanceConfig, BinanceExchange, BinanceTransport, Method, RestRequest, RestResponse,
};
pub use payload::{
    map_error_code, parse_account_balances, parse_cancel_report, parse_error, parse_exchange_info,
    parse_order_report, parse_status, parse_symbol_metadata,
};
