//! Binance Spot 어댑터.
//!
//! 서명과 HTTP 호출은 주입된 [`BinanceTransport`]가 담당하고,
//! 이 어댑터는 요청 파라미터 구성과 응답 정규화만 수행합니다.

use async_trait::async_trait;
use spot_core::{ExchangeSettings, OrderAmount, OrderReport, Price, Quantity, Side};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::payload::{
    parse_account_balances, parse_cancel_report, parse_error, parse_exchange_info,
    parse_order_report,
};
use crate::traits::{Balance, CancelReport, Exchange, ExchangeResult, SymbolMetadata};
use crate::ExchangeError;

/// HTTP 메서드.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

/// 전송 계층에 넘기는 REST 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestRequest {
    pub method: Method,
    pub base_url: &'static str,
    pub path: &'static str,
    pub params: Vec<(&'static str, String)>,
    /// 서명 필요 여부. 전송 계층이 `timestamp`와 `signature`를 붙입니다.
    pub signed: bool,
}

impl RestRequest {
    /// 파라미터 값 조회.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// 전송 계층 응답 (HTTP 상태 코드와 본문).
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: u16,
    pub body: String,
}

impl RestResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Binance REST 전송 계층.
///
/// 구현체는 API 키 헤더, HMAC 서명, 타임스탬프, HTTP 호출을 담당합니다.
/// 연결 자체가 실패하면 `NetworkError` 또는 `Timeout`을 반환하고,
/// HTTP 에러 응답은 그대로 `RestResponse`로 돌려줘야 합니다.
#[async_trait]
pub trait BinanceTransport: Send + Sync {
    async fn send(&self, request: RestRequest) -> ExchangeResult<RestResponse>;
}

/// Binance 어댑터 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinanceConfig {
    /// 테스트넷 사용
    pub testnet: bool,
    /// 수신 윈도우 (밀리초)
    pub recv_window_ms: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            testnet: false,
            recv_window_ms: 5000,
        }
    }
}

impl BinanceConfig {
    /// 테스트넷 사용.
    pub fn with_testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    /// 계좌 설정에서 생성.
    pub fn from_settings(settings: &ExchangeSettings) -> Self {
        Self {
            testnet: settings.testnet,
            recv_window_ms: settings.recv_window_ms,
        }
    }

    /// REST API 기본 URL 반환.
    pub fn rest_base_url(&self) -> &'static str {
        if self.testnet {
            "https://testnet.binance.vision"
        } else {
            "https://api.binance.com"
        }
    }
}

/// Binance Spot `Exchange` 구현.
pub struct BinanceExchange {
    transport: Arc<dyn BinanceTransport>,
    config: BinanceConfig,
}

impl BinanceExchange {
    pub fn new(transport: Arc<dyn BinanceTransport>, config: BinanceConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &BinanceConfig {
        &self.config
    }

    fn side_param(side: Side) -> &'static str {
        match side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// 요청을 보내고 성공 응답 본문을 반환합니다. 에러 응답은 정규화됩니다.
    async fn call(
        &self,
        method: Method,
        path: &'static str,
        mut params: Vec<(&'static str, String)>,
        signed: bool,
    ) -> ExchangeResult<String> {
        if signed {
            params.push(("recvWindow", self.config.recv_window_ms.to_string()));
        }

        let response = self
            .transport
            .send(RestRequest {
                method,
                base_url: self.config.rest_base_url(),
                path,
                params,
                signed,
            })
            .await?;

        if response.is_success() {
            Ok(response.body)
        } else {
            let err = parse_error(response.status, &response.body);
            warn!(path, status = response.status, error = %err, "Binance request failed");
            Err(err)
        }
    }

    async fn place_order(
        &self,
        mut params: Vec<(&'static str, String)>,
        client_order_id: Option<&str>,
    ) -> ExchangeResult<OrderReport> {
        if let Some(id) = client_order_id {
            params.push(("newClientOrderId", id.to_string()));
        }
        params.push(("newOrderRespType", "RESULT".to_string()));

        let body = self.call(Method::Post, "/api/v3/order", params, true).await?;
        let report = parse_order_report(&body)?;
        info!(
            symbol = %report.symbol,
            order_id = %report.order_id,
            status = %report.status,
            "Binance 주문 접수"
        );
        Ok(report)
    }
}

#[async_trait]
impl Exchange for BinanceExchange {
    fn name(&self) -> &str {
        "binance"
    }

    async fn get_account_balances(&self) -> ExchangeResult<Vec<Balance>> {
        let body = self.call(Method::Get, "/api/v3/account", Vec::new(), true).await?;
        parse_account_balances(&body)
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        amount: OrderAmount,
        client_order_id: Option<&str>,
    ) -> ExchangeResult<OrderReport> {
        let size = match amount {
            OrderAmount::Quote(q) => ("quoteOrderQty", q.normalize().to_string()),
            OrderAmount::Base(q) => ("quantity", q.normalize().to_string()),
        };
        let params = vec![
            ("symbol", symbol.to_string()),
            ("side", Self::side_param(side).to_string()),
            ("type", "MARKET".to_string()),
            size,
        ];
        self.place_order(params, client_order_id).await
    }

    async fn place_limit_order(
        &self,
        symbol: &str,
        side: Side,
        price: Price,
        quantity: Quantity,
        client_order_id: Option<&str>,
    ) -> ExchangeResult<OrderReport> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("side", Self::side_param(side).to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", "GTC".to_string()),
            ("quantity", quantity.normalize().to_string()),
            ("price", price.normalize().to_string()),
        ];
        self.place_order(params, client_order_id).await
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<CancelReport> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];

        match self.call(Method::Delete, "/api/v3/order", params, true).await {
            Ok(body) => parse_cancel_report(&body),
            // 이미 종료된 주문은 -2011로 거부되므로 현재 상태를 조회해 돌려줌
            Err(ExchangeError::OrderNotFound(msg)) => match self.get_order(symbol, order_id).await {
                Ok(report) if report.status.is_final() => {
                    debug!(order_id, status = %report.status, "취소 대상 주문이 이미 종료됨");
                    Ok(CancelReport {
                        order_id: report.order_id,
                        symbol: report.symbol,
                        status: report.status,
                        raw: report.raw,
                    })
                }
                _ => Err(ExchangeError::OrderNotFound(msg)),
            },
            Err(e) => Err(e),
        }
    }

    async fn get_symbol_metadata(&self, symbol: &str) -> ExchangeResult<SymbolMetadata> {
        let params = vec![("symbol", symbol.to_string())];
        let body = self
            .call(Method::Get, "/api/v3/exchangeInfo", params, false)
            .await?;
        parse_exchange_info(&body, symbol)
    }

    async fn get_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<OrderReport> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let body = self.call(Method::Get, "/api/v3/order", params, true).await?;
        parse_order_report(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use spot_core::OrderStatusType;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// 준비된 응답을 순서대로 돌려주고 요청을 기록하는 전송 계층.
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<RestResponse>>,
        requests: Mutex<Vec<RestRequest>>,
    }

    impl ScriptedTransport {
        fn with(responses: Vec<RestResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<RestRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BinanceTransport for ScriptedTransport {
        async fn send(&self, request: RestRequest) -> ExchangeResult<RestResponse> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ExchangeError::NetworkError("no scripted response".into()))
        }
    }

    const FILLED_BUY: &str = r#"{
        "symbol": "BTCUSDT", "orderId": 28, "clientOrderId": "abc",
        "transactTime": 1507725176595, "executedQty": "0.00500000",
        "cummulativeQuoteQty": "100.00000000", "status": "FILLED", "type": "MARKET", "side": "BUY"
    }"#;

    fn exchange(transport: Arc<ScriptedTransport>, testnet: bool) -> BinanceExchange {
        BinanceExchange::new(transport, BinanceConfig::default().with_testnet(testnet))
    }

    #[tokio::test]
    async fn test_account_balances_signed_request() {
        let transport = ScriptedTransport::with(vec![RestResponse::new(
            200,
            r#"{"balances": [{"asset": "USDT", "free": "1000", "locked": "0"}]}"#,
        )]);
        let ex = exchange(transport.clone(), true);

        let balances = ex.get_account_balances().await.unwrap();
        assert_eq!(balances[0].free, dec!(1000));

        let req = &transport.requests()[0];
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path, "/api/v3/account");
        assert_eq!(req.base_url, "https://testnet.binance.vision");
        assert!(req.signed);
        assert_eq!(req.param("recvWindow"), Some("5000"));
    }

    #[tokio::test]
    async fn test_market_buy_sends_quote_order_qty() {
        let transport = ScriptedTransport::with(vec![RestResponse::new(200, FILLED_BUY)]);
        let ex = exchange(transport.clone(), false);

        let report = ex
            .place_market_order("BTCUSDT", Side::Buy, OrderAmount::Quote(dec!(100.00)), Some("abc"))
            .await
            .unwrap();
        assert_eq!(report.status, OrderStatusType::Filled);
        assert_eq!(report.filled_quantity, dec!(0.005));

        let req = &transport.requests()[0];
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.base_url, "https://api.binance.com");
        assert_eq!(req.param("type"), Some("MARKET"));
        assert_eq!(req.param("quoteOrderQty"), Some("100"));
        assert_eq!(req.param("quantity"), None);
        assert_eq!(req.param("newClientOrderId"), Some("abc"));
    }

    #[tokio::test]
    async fn test_limit_order_params() {
        let body = r#"{"symbol": "BTCUSDT", "orderId": 7, "executedQty": "0", "cummulativeQuoteQty": "0",
                      "status": "NEW", "side": "SELL"}"#;
        let transport = ScriptedTransport::with(vec![RestResponse::new(200, body)]);
        let ex = exchange(transport.clone(), false);

        let report = ex
            .place_limit_order("BTCUSDT", Side::Sell, dec!(25000.00), dec!(0.005), None)
            .await
            .unwrap();
        assert_eq!(report.status, OrderStatusType::Submitted);
        assert_eq!(report.average_price, None);

        let req = &transport.requests()[0];
        assert_eq!(req.param("side"), Some("SELL"));
        assert_eq!(req.param("timeInForce"), Some("GTC"));
        assert_eq!(req.param("price"), Some("25000"));
        assert_eq!(req.param("quantity"), Some("0.005"));
    }

    #[tokio::test]
    async fn test_error_response_is_normalized() {
        let transport = ScriptedTransport::with(vec![RestResponse::new(
            400,
            r#"{"code": -2010, "msg": "Account has insufficient balance for requested action."}"#,
        )]);
        let ex = exchange(transport, false);

        let result = ex
            .place_market_order("BTCUSDT", Side::Buy, OrderAmount::Quote(dec!(100)), None)
            .await;
        assert!(matches!(result, Err(ExchangeError::InsufficientBalance(_))));
    }

    #[tokio::test]
    async fn test_cancel_of_filled_order_returns_current_state() {
        let transport = ScriptedTransport::with(vec![
            RestResponse::new(400, r#"{"code": -2011, "msg": "Unknown order sent."}"#),
            RestResponse::new(200, FILLED_BUY),
        ]);
        let ex = exchange(transport.clone(), false);

        let report = ex.cancel_order("BTCUSDT", "28").await.unwrap();
        assert_eq!(report.status, OrderStatusType::Filled);

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Delete);
        assert_eq!(requests[1].method, Method::Get);
        assert_eq!(requests[1].param("orderId"), Some("28"));
    }

    #[tokio::test]
    async fn test_cancel_of_unknown_order_is_not_found() {
        let transport = ScriptedTransport::with(vec![
            RestResponse::new(400, r#"{"code": -2011, "msg": "Unknown order sent."}"#),
            RestResponse::new(400, r#"{"code": -2013, "msg": "Order does not exist."}"#),
        ]);
        let ex = exchange(transport, false);

        let result = ex.cancel_order("BTCUSDT", "404").await;
        assert!(matches!(result, Err(ExchangeError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_symbol_metadata_is_public_request() {
        let body = r#"{"symbols": [{"symbol": "BTCUSDT", "baseAsset": "BTC", "quoteAsset": "USDT",
                       "quoteAssetPrecision": 8, "filters": [{"filterType": "LOT_SIZE", "stepSize": "0.00100000"}]}]}"#;
        let transport = ScriptedTransport::with(vec![RestResponse::new(200, body)]);
        let ex = exchange(transport.clone(), false);

        let meta = ex.get_symbol_metadata("BTCUSDT").await.unwrap();
        assert_eq!(meta.lot_size, dec!(0.001));

        let req = &transport.requests()[0];
        assert!(!req.signed);
        assert_eq!(req.param("recvWindow"), None);
    }

    #[tokio::test]
    async fn test_transport_failure_passes_through() {
        let ex = exchange(ScriptedTransport::with(Vec::new()), false);
        let result = ex.get_account_balances().await;
        assert!(matches!(result, Err(ExchangeError::NetworkError(_))));
    }
}
