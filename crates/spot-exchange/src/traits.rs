//! 거래소 trait 정의.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spot_core::{OrderAmount, OrderReport, OrderStatusType, Price, Quantity, Side, TradingMetadata};

use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 거래소가 보고하는 자산 잔고.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// 자산 이름 (예: "BTC", "USDT")
    pub asset: String,
    /// 사용 가능한 잔고
    pub free: Decimal,
    /// 주문에 묶인 잔고
    pub locked: Decimal,
}

impl Balance {
    /// 새 잔고를 생성합니다.
    pub fn new(asset: impl Into<String>, free: Decimal, locked: Decimal) -> Self {
        Self {
            asset: asset.into(),
            free,
            locked,
        }
    }

    /// 총 잔고 반환 (사용 가능 + 묶인 잔고).
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }
}

/// 심볼의 거래 규칙.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMetadata {
    /// 거래소 형식 심볼 (예: "BTCUSDT")
    pub symbol: String,
    /// 기준 자산
    pub base_asset: String,
    /// 호가 자산
    pub quote_asset: String,
    /// 소수점 정밀도
    pub precision: u32,
    /// 최소 수량 증분
    pub lot_size: Decimal,
    /// 거래소 원본 필터 목록
    #[serde(default)]
    pub filters: serde_json::Value,
}

impl SymbolMetadata {
    /// 엔진이 캐시하는 거래 메타데이터로 변환합니다.
    pub fn trading_metadata(&self) -> TradingMetadata {
        TradingMetadata::new(self.symbol.clone(), self.precision, self.lot_size)
    }
}

/// 주문 취소 응답.
///
/// 엔진은 이 응답을 수정하지 않고 호출자에게 그대로 전달합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelReport {
    /// 거래소 주문 ID
    pub order_id: String,
    /// 거래소 형식 심볼
    pub symbol: String,
    /// 취소 요청 이후의 주문 상태
    pub status: OrderStatusType,
    /// 거래소 원본 응답
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// 엔진이 소비하는 거래소 기능 인터페이스.
///
/// 어댑터는 거래소별 페이로드를 정규화된 타입으로 변환해야 합니다.
/// 이 목록의 기능을 제공하는 어떤 어댑터든 엔진 변경 없이 교체할 수 있습니다.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// 거래소 이름 반환.
    fn name(&self) -> &str;

    // === 계좌 작업 ===

    /// 모든 자산의 잔고 조회.
    async fn get_account_balances(&self) -> ExchangeResult<Vec<Balance>>;

    // === 주문 작업 ===

    /// 시장가 주문 제출. 매수는 호가 금액, 매도는 기준 수량을 받습니다.
    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        amount: OrderAmount,
        client_order_id: Option<&str>,
    ) -> ExchangeResult<OrderReport>;

    /// 지정가 주문 제출.
    async fn place_limit_order(
        &self,
        symbol: &str,
        side: Side,
        price: Price,
        quantity: Quantity,
        client_order_id: Option<&str>,
    ) -> ExchangeResult<OrderReport>;

    /// 주문 취소.
    ///
    /// 이미 최종 상태인 주문의 취소는 에러가 아니라 현재 상태를 돌려줘야 합니다.
    async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<CancelReport>;

    /// 심볼의 거래 규칙 조회.
    async fn get_symbol_metadata(&self, symbol: &str) -> ExchangeResult<SymbolMetadata>;

    /// 주문 상태 조회.
    ///
    /// 지원하지 않는 어댑터는 기본 구현을 사용하며, 제출기는 이때 폴링을 건너뜁니다.
    async fn get_order(&self, _symbol: &str, order_id: &str) -> ExchangeResult<OrderReport> {
        Err(ExchangeError::NotSupported(format!(
            "order query not supported ({})",
            order_id
        )))
    }
}
