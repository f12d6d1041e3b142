//! 주문 타입 및 관리.
//!
//! 이 모듈은 엔진의 주문 관련 타입을 정의합니다:
//! - `Side` - 주문 방향 (매수/매도)
//! - `OrderType` - 주문 유형 (시장가, 지정가)
//! - `OrderAmount` - 기준 자산 수량 또는 호가 금액
//! - `OrderStatusType` - 주문 상태
//! - `OrderRequest` - 주문 요청
//! - `OrderReport` - 거래소가 반환한 정규화된 주문 상태
//! - `Order` - 해결 구간 동안 추적되는 주문 엔티티

use crate::error::{CoreError, CoreResult};
use crate::types::{Price, Quantity, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 주문 방향 (매수 또는 매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// 주문 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// 시장가 주문 - 현재 시장 가격으로 즉시 체결
    Market,
    /// 지정가 주문 - 지정 가격 이상/이하에서 체결
    Limit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
        }
    }
}

/// 주문 크기 지정 방식.
///
/// 시장가 매수는 호가 금액으로 주문하고 거래소가 수량 환산을 수행합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum OrderAmount {
    /// 기준 자산 수량
    Base(Quantity),
    /// 호가 자산 금액
    Quote(Decimal),
}

impl OrderAmount {
    /// 내부 값을 반환합니다.
    pub fn value(&self) -> Decimal {
        match self {
            OrderAmount::Base(q) => *q,
            OrderAmount::Quote(a) => *a,
        }
    }
}

/// 주문 상태 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusType {
    /// 거래소에 제출됨 (대기 중)
    Submitted,
    /// 부분 체결됨
    PartiallyFilled,
    /// 전량 체결됨
    Filled,
    /// 거래소에서 거부됨
    Rejected,
    /// 취소됨 (만료 포함)
    Cancelled,
}

impl OrderStatusType {
    /// 주문이 최종 상태인지 확인합니다.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderStatusType::Filled | OrderStatusType::Cancelled | OrderStatusType::Rejected
        )
    }

    /// 주문이 여전히 활성 상태인지 확인합니다.
    pub fn is_active(&self) -> bool {
        !self.is_final()
    }
}

impl std::fmt::Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatusType::Submitted => "SUBMITTED",
            OrderStatusType::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatusType::Filled => "FILLED",
            OrderStatusType::Rejected => "REJECTED",
            OrderStatusType::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

/// 새 주문 생성을 위한 주문 요청.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// 거래 심볼
    pub symbol: Symbol,
    /// 주문 방향
    pub side: Side,
    /// 주문 유형
    pub order_type: OrderType,
    /// 주문 크기
    pub amount: OrderAmount,
    /// 지정가 (지정가 주문에 필수)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    /// 클라이언트 주문 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

impl OrderRequest {
    /// 호가 금액 기반 시장가 매수 주문을 생성합니다.
    pub fn market_buy_quote(symbol: Symbol, quote_amount: Decimal) -> Self {
        Self {
            symbol,
            side: Side::Buy,
            order_type: OrderType::Market,
            amount: OrderAmount::Quote(quote_amount),
            price: None,
            client_order_id: None,
        }
    }

    /// 시장가 매도 주문을 생성합니다.
    pub fn market_sell(symbol: Symbol, quantity: Quantity) -> Self {
        Self {
            symbol,
            side: Side::Sell,
            order_type: OrderType::Market,
            amount: OrderAmount::Base(quantity),
            price: None,
            client_order_id: None,
        }
    }

    /// 지정가 매수 주문을 생성합니다.
    pub fn limit_buy(symbol: Symbol, quantity: Quantity, price: Price) -> Self {
        Self {
            symbol,
            side: Side::Buy,
            order_type: OrderType::Limit,
            amount: OrderAmount::Base(quantity),
            price: Some(price),
            client_order_id: None,
        }
    }

    /// 지정가 매도 주문을 생성합니다.
    pub fn limit_sell(symbol: Symbol, quantity: Quantity, price: Price) -> Self {
        Self {
            symbol,
            side: Side::Sell,
            order_type: OrderType::Limit,
            amount: OrderAmount::Base(quantity),
            price: Some(price),
            client_order_id: None,
        }
    }

    /// 클라이언트 주문 ID를 설정합니다.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_order_id = Some(client_id.into());
        self
    }

    /// 네트워크 호출 전에 요청의 형태를 검증합니다.
    pub fn validate(&self) -> CoreResult<()> {
        if self.amount.value() <= Decimal::ZERO {
            return Err(CoreError::InvalidInput(format!(
                "order amount must be positive: {}",
                self.amount.value()
            )));
        }

        match (self.order_type, self.price) {
            (OrderType::Limit, None) => Err(CoreError::InvalidInput(
                "limit order requires a price".into(),
            )),
            (OrderType::Limit, Some(p)) if p <= Decimal::ZERO => Err(CoreError::InvalidInput(
                format!("limit price must be positive: {}", p),
            )),
            (OrderType::Limit, Some(_)) if matches!(self.amount, OrderAmount::Quote(_)) => Err(
                CoreError::InvalidInput("limit order must be sized in base quantity".into()),
            ),
            (OrderType::Market, Some(_)) => Err(CoreError::InvalidInput(
                "market order must not carry a price".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// 거래소에서 반환하는 정규화된 주문 상태 보고서.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReport {
    /// 거래소 주문 ID
    pub order_id: String,
    /// 클라이언트 주문 ID (있는 경우)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    /// 거래소 형식 심볼
    pub symbol: String,
    /// 주문 방향
    pub side: Side,
    /// 현재 상태
    pub status: OrderStatusType,
    /// 체결된 기준 자산 수량
    pub filled_quantity: Quantity,
    /// 체결된 호가 자산 누적 금액
    pub cumulative_quote: Decimal,
    /// 평균 체결 가격 (체결이 있는 경우)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_price: Option<Price>,
    /// 마지막 업데이트 시각
    pub updated_at: DateTime<Utc>,
    /// 거래소 원본 응답
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl OrderReport {
    /// 체결 가격을 반환합니다. 평균가가 없으면 누적 금액으로 계산합니다.
    pub fn fill_price(&self) -> Option<Price> {
        self.average_price.or_else(|| {
            if self.filled_quantity.is_zero() {
                None
            } else {
                Some(self.cumulative_quote / self.filled_quantity)
            }
        })
    }

    /// 전량 체결 여부.
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatusType::Filled
    }
}

/// 제출된 주문을 나타내는 주문 엔티티.
///
/// 제출 시도 시 생성되며 최종 상태가 될 때까지 제출기가 소유합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// 내부 주문 ID
    pub id: Uuid,
    /// 원본 요청
    pub request: OrderRequest,
    /// 거래소 주문 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_order_id: Option<String>,
    /// 현재 상태
    pub status: OrderStatusType,
    /// 마지막으로 수신한 보고서
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_report: Option<OrderReport>,
    /// 생성 타임스탬프
    pub created_at: DateTime<Utc>,
    /// 마지막 업데이트 타임스탬프
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// 요청으로부터 새 주문을 생성합니다.
    ///
    /// 클라이언트 주문 ID가 없으면 내부 ID를 클라이언트 ID로 사용합니다.
    pub fn from_request(mut request: OrderRequest) -> Self {
        let now = Utc::now();
        let id = Uuid::new_v4();
        if request.client_order_id.is_none() {
            request.client_order_id = Some(id.simple().to_string());
        }
        Self {
            id,
            request,
            exchange_order_id: None,
            status: OrderStatusType::Submitted,
            last_report: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 거래소 보고서를 반영합니다.
    ///
    /// 최종 상태가 된 주문은 더 이상 변경되지 않습니다.
    pub fn apply_report(&mut self, report: OrderReport) {
        if self.status.is_final() {
            return;
        }
        self.exchange_order_id = Some(report.order_id.clone());
        self.status = report.status;
        self.updated_at = report.updated_at;
        self.last_report = Some(report);
    }

    /// 주문이 최종 상태인지 확인합니다.
    pub fn is_final(&self) -> bool {
        self.status.is_final()
    }
}
