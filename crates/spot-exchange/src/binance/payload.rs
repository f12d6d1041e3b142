//! Binance 응답 페이로드 정규화.
//!
//! Binance Spot REST 응답(JSON)을 엔진의 정규화 타입으로 변환합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use spot_core::{OrderReport, OrderStatusType, Side};
use tracing::warn;

use crate::traits::{Balance, CancelReport, ExchangeResult, SymbolMetadata};
use crate::ExchangeError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceAccountBalance {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceAccountInfo {
    balances: Vec<BinanceAccountBalance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceSymbolInfo {
    symbol: String,
    base_asset: String,
    quote_asset: String,
    quote_asset_precision: u32,
    #[serde(default)]
    filters: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceOrderResponse {
    symbol: String,
    order_id: i64,
    #[serde(default)]
    client_order_id: Option<String>,
    #[serde(default)]
    transact_time: Option<i64>,
    #[serde(default)]
    update_time: Option<i64>,
    #[serde(default)]
    executed_qty: Option<String>,
    #[serde(default)]
    cummulative_quote_qty: Option<String>,
    status: String,
    side: String,
}

#[derive(Debug, Deserialize)]
struct BinanceError {
    code: i32,
    msg: String,
}

/// 문자열에서 Decimal 파싱.
fn parse_decimal(field: &str, s: &str) -> ExchangeResult<Decimal> {
    s.parse()
        .map_err(|e| ExchangeError::ParseError(format!("{}: {} ({})", field, s, e)))
}

/// Binance 주문 상태 문자열을 정규화.
pub fn parse_status(status: &str) -> OrderStatusType {
    match status {
        "NEW" | "PENDING_NEW" | "PENDING_CANCEL" => OrderStatusType::Submitted,
        "PARTIALLY_FILLED" => OrderStatusType::PartiallyFilled,
        "FILLED" => OrderStatusType::Filled,
        "CANCELED" | "EXPIRED" | "EXPIRED_IN_MATCH" => OrderStatusType::Cancelled,
        "REJECTED" => OrderStatusType::Rejected,
        other => {
            warn!(status = other, "Unknown Binance order status, treating as submitted");
            OrderStatusType::Submitted
        }
    }
}

/// Binance 에러 코드를 ExchangeError로 매핑.
pub fn map_error_code(code: i32, msg: &str) -> ExchangeError {
    match code {
        -1000 => ExchangeError::Unknown(msg.to_string()),
        -1001 => ExchangeError::Disconnected(msg.to_string()),
        -1002 | -2014 | -2015 => ExchangeError::Unauthorized(msg.to_string()),
        -1003 | -1015 => ExchangeError::RateLimited,
        -1007 => ExchangeError::Timeout(msg.to_string()),
        -1013 if msg.contains("MAX_NUM") => ExchangeError::AccountLimit(msg.to_string()),
        -1013 | -1111 => ExchangeError::InvalidQuantity(msg.to_string()),
        -1021 => ExchangeError::TimestampError(msg.to_string()),
        -1121 => ExchangeError::SymbolNotFound(msg.to_string()),
        -2010 => ExchangeError::InsufficientBalance(msg.to_string()),
        -2011 | -2013 => ExchangeError::OrderNotFound(msg.to_string()),
        _ => ExchangeError::ApiError {
            code,
            message: msg.to_string(),
        },
    }
}

/// 에러 응답 본문을 파싱합니다. 형식이 맞지 않으면 HTTP 상태 코드로 감쌉니다.
pub fn parse_error(http_status: u16, body: &str) -> ExchangeError {
    match serde_json::from_str::<BinanceError>(body) {
        Ok(err) => map_error_code(err.code, &err.msg),
        Err(_) => ExchangeError::ApiError {
            code: http_status as i32,
            message: body.to_string(),
        },
    }
}

/// `GET /api/v3/account` 응답에서 잔고 목록을 추출합니다.
pub fn parse_account_balances(body: &str) -> ExchangeResult<Vec<Balance>> {
    let info: BinanceAccountInfo = serde_json::from_str(body)?;
    info.balances
        .into_iter()
        .map(|b| {
            Ok(Balance::new(
                b.asset,
                parse_decimal("free", &b.free)?,
                parse_decimal("locked", &b.locked)?,
            ))
        })
        .collect()
}

/// `exchangeInfo`의 심볼 항목을 메타데이터로 변환합니다.
///
/// 정밀도는 `quoteAssetPrecision`, 로트 단위는 `LOT_SIZE` 필터의 `stepSize`를 사용합니다.
pub fn parse_symbol_metadata(body: &str) -> ExchangeResult<SymbolMetadata> {
    let info: BinanceSymbolInfo = serde_json::from_str(body)?;

    let step = info
        .filters
        .iter()
        .find(|f| f.get("filterType").and_then(|t| t.as_str()) == Some("LOT_SIZE"))
        .and_then(|f| f.get("stepSize"))
        .and_then(|s| s.as_str())
        .ok_or_else(|| {
            ExchangeError::ParseError(format!("LOT_SIZE filter missing for {}", info.symbol))
        })?;

    Ok(SymbolMetadata {
        lot_size: parse_decimal("stepSize", step)?.normalize(),
        precision: info.quote_asset_precision,
        filters: serde_json::Value::Array(info.filters),
        symbol: info.symbol,
        base_asset: info.base_asset,
        quote_asset: info.quote_asset,
    })
}

#[derive(Debug, Deserialize)]
struct BinanceExchangeInfo {
    symbols: Vec<serde_json::Value>,
}

/// `GET /api/v3/exchangeInfo?symbol=` 응답에서 해당 심볼의 메타데이터를 추출합니다.
pub fn parse_exchange_info(body: &str, symbol: &str) -> ExchangeResult<SymbolMetadata> {
    let info: BinanceExchangeInfo = serde_json::from_str(body)?;
    let entry = info
        .symbols
        .into_iter()
        .find(|s| s.get("symbol").and_then(|v| v.as_str()) == Some(symbol))
        .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))?;
    parse_symbol_metadata(&entry.to_string())
}

/// 주문 응답(`POST/GET /api/v3/order`)을 주문 보고서로 변환합니다.
pub fn parse_order_report(body: &str) -> ExchangeResult<OrderReport> {
    let raw: serde_json::Value = serde_json::from_str(body)?;
    let resp: BinanceOrderResponse = serde_json::from_value(raw.clone())?;

    let side = match resp.side.as_str() {
        "BUY" => Side::Buy,
        "SELL" => Side::Sell,
        other => return Err(ExchangeError::ParseError(format!("unknown side: {}", other))),
    };

    let filled_quantity = match resp.executed_qty.as_deref() {
        Some(q) => parse_decimal("executedQty", q)?,
        None => Decimal::ZERO,
    };
    let cumulative_quote = match resp.cummulative_quote_qty.as_deref() {
        Some(q) => parse_decimal("cummulativeQuoteQty", q)?,
        None => Decimal::ZERO,
    };
    let average_price = if filled_quantity > Decimal::ZERO {
        cumulative_quote.checked_div(filled_quantity)
    } else {
        None
    };

    let updated_at = resp
        .update_time
        .or(resp.transact_time)
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now);

    Ok(OrderReport {
        order_id: resp.order_id.to_string(),
        client_order_id: resp.client_order_id,
        symbol: resp.symbol,
        side,
        status: parse_status(&resp.status),
        filled_quantity,
        cumulative_quote,
        average_price,
        updated_at,
        raw,
    })
}

/// 취소 응답(`DELETE /api/v3/order`)을 변환합니다.
pub fn parse_cancel_report(body: &str) -> ExchangeResult<CancelReport> {
    let report = parse_order_report(body)?;
    Ok(CancelReport {
        order_id: report.order_id,
        symbol: report.symbol,
        status: report.status,
        raw: report.raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_account_balances() {
        let body = r#"{
            "makerCommission": 10,
            "canTrade": true,
            "balances": [
                {"asset": "BTC", "free": "0.00500000", "locked": "0.00000000"},
                {"asset": "USDT", "free": "1000.00", "locked": "25.5"}
            ]
        }"#;

        let balances = parse_account_balances(body).unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].asset, "BTC");
        assert_eq!(balances[0].free, dec!(0.005));
        assert_eq!(balances[1].total(), dec!(1025.5));
    }

    #[test]
    fn test_parse_symbol_metadata() {
        let body = r#"{
            "symbol": "BTCUSDT",
            "status": "TRADING",
            "baseAsset": "BTC",
            "quoteAsset": "USDT",
            "quoteAssetPrecision": 8,
            "filters": [
                {"filterType": "PRICE_FILTER", "tickSize": "0.01000000"},
                {"filterType": "LOT_SIZE", "minQty": "0.00001000", "maxQty": "9000.00000000", "stepSize": "0.00001000"}
            ]
        }"#;

        let meta = parse_symbol_metadata(body).unwrap();
        assert_eq!(meta.symbol, "BTCUSDT");
        assert_eq!(meta.base_asset, "BTC");
        assert_eq!(meta.precision, 8);
        assert_eq!(meta.lot_size, dec!(0.00001));
        assert_eq!(meta.trading_metadata().lot_size, dec!(0.00001));
    }

    #[test]
    fn test_parse_exchange_info_picks_symbol() {
        let body = r#"{
            "timezone": "UTC",
            "symbols": [
                {"symbol": "ETHUSDT", "baseAsset": "ETH", "quoteAsset": "USDT", "quoteAssetPrecision": 8,
                 "filters": [{"filterType": "LOT_SIZE", "stepSize": "0.00010000"}]},
                {"symbol": "BTCUSDT", "baseAsset": "BTC", "quoteAsset": "USDT", "quoteAssetPrecision": 8,
                 "filters": [{"filterType": "LOT_SIZE", "stepSize": "0.00001000"}]}
            ]
        }"#;

        let meta = parse_exchange_info(body, "BTCUSDT").unwrap();
        assert_eq!(meta.base_asset, "BTC");
        assert_eq!(meta.lot_size, dec!(0.00001));

        assert!(matches!(
            parse_exchange_info(body, "DOGEUSDT"),
            Err(ExchangeError::SymbolNotFound(_))
        ));
    }

    #[test]
    fn test_parse_symbol_metadata_without_lot_size() {
        let body = r#"{"symbol": "X", "baseAsset": "X", "quoteAsset": "Y", "quoteAssetPrecision": 2, "filters": []}"#;
        assert!(matches!(
            parse_symbol_metadata(body),
            Err(ExchangeError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_market_buy_response() {
        let body = r#"{
            "symbol": "BTCUSDT",
            "orderId": 28,
            "clientOrderId": "6gCrw2kRUAF9CvJDGP16IP",
            "transactTime": 1507725176595,
            "price": "0.00000000",
            "origQty": "0.00500000",
            "executedQty": "0.00500000",
            "cummulativeQuoteQty": "100.00000000",
            "status": "FILLED",
            "type": "MARKET",
            "side": "BUY"
        }"#;

        let report = parse_order_report(body).unwrap();
        assert_eq!(report.order_id, "28");
        assert_eq!(report.status, OrderStatusType::Filled);
        assert_eq!(report.side, Side::Buy);
        assert_eq!(report.filled_quantity, dec!(0.005));
        assert_eq!(report.average_price, Some(dec!(20000)));
        assert_eq!(report.raw["type"], "MARKET");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(parse_status("NEW"), OrderStatusType::Submitted);
        assert_eq!(parse_status("PARTIALLY_FILLED"), OrderStatusType::PartiallyFilled);
        assert_eq!(parse_status("EXPIRED"), OrderStatusType::Cancelled);
        assert_eq!(parse_status("REJECTED"), OrderStatusType::Rejected);
    }

    #[test]
    fn test_error_mapping() {
        let err = parse_error(400, r#"{"code": -2010, "msg": "Account has insufficient balance for requested action."}"#);
        assert!(matches!(err, ExchangeError::InsufficientBalance(_)));

        let err = parse_error(400, r#"{"code": -1013, "msg": "Filter failure: LOT_SIZE"}"#);
        assert!(matches!(err, ExchangeError::InvalidQuantity(_)));

        let err = parse_error(400, r#"{"code": -1013, "msg": "Filter failure: MAX_NUM_ORDERS"}"#);
        assert!(matches!(err, ExchangeError::AccountLimit(_)));

        let err = parse_error(401, r#"{"code": -2015, "msg": "Invalid API-key"}"#);
        assert!(err.is_fatal());

        let err = parse_error(502, "<html>bad gateway</html>");
        assert!(matches!(err, ExchangeError::ApiError { code: 502, .. }));
    }
}
