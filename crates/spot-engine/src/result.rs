//! 거래 결과와 실패 사유.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spot_core::{OrderReport, Price, Quantity, Side};
use spot_exchange::ExchangeError;
use spot_risk::SizingError;

/// 구조화된 비즈니스 실패 사유.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// 네트워크 호출 전에 거부된 잘못된 입력
    Validation(String),
    /// 추적되지 않는 자산, 심볼 또는 주문
    NotFound(String),
    /// 잔고가 최소 임계값이나 요청 수량보다 적음
    InsufficientFunds(String),
    /// 목표 금액이 사용 가능 잔고를 초과
    BudgetExceeded { spend: Decimal, available: Decimal },
    /// 계좌 수준 한도로 새 자산/주문을 열 수 없음
    NoRoomForNewAsset(String),
    /// 로트 단위/정밀도 위반 (로컬 판단 또는 거래소 원본 거부)
    PrecisionRejected(String),
    /// 거래소 장애 또는 거부
    ExchangeError(String),
    /// 매수가 전량 체결되지 않았거나 매도가 수락되지 않음
    Unfilled(OrderReport),
}

impl FailureReason {
    /// 거래소 에러를 실패 사유로 정규화합니다.
    ///
    /// 거래소의 정밀도 거부는 원본 메시지를 그대로 유지합니다.
    pub fn from_exchange(err: &ExchangeError) -> Self {
        match err {
            ExchangeError::InsufficientBalance(msg) => FailureReason::InsufficientFunds(msg.clone()),
            ExchangeError::InvalidQuantity(msg) => FailureReason::PrecisionRejected(msg.clone()),
            ExchangeError::AccountLimit(msg) => FailureReason::NoRoomForNewAsset(msg.clone()),
            ExchangeError::SymbolNotFound(msg) => FailureReason::NotFound(msg.clone()),
            other => FailureReason::ExchangeError(other.to_string()),
        }
    }
}

impl From<SizingError> for FailureReason {
    fn from(err: SizingError) -> Self {
        match err {
            SizingError::InsufficientFunds { .. } => FailureReason::InsufficientFunds(err.to_string()),
            SizingError::BudgetExceeded { spend, available } => {
                FailureReason::BudgetExceeded { spend, available }
            }
            SizingError::BelowLotSize { .. } => FailureReason::PrecisionRejected(err.to_string()),
            SizingError::InvalidInput(msg) => FailureReason::Validation(msg),
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Validation(msg) => write!(f, "validation: {}", msg),
            FailureReason::NotFound(msg) => write!(f, "not found: {}", msg),
            FailureReason::InsufficientFunds(msg) => write!(f, "insufficient funds: {}", msg),
            FailureReason::BudgetExceeded { spend, available } => {
                write!(f, "budget exceeded: spend {} > available {}", spend, available)
            }
            FailureReason::NoRoomForNewAsset(msg) => write!(f, "no room for new asset: {}", msg),
            FailureReason::PrecisionRejected(msg) => write!(f, "precision rejected: {}", msg),
            FailureReason::ExchangeError(msg) => write!(f, "exchange error: {}", msg),
            FailureReason::Unfilled(report) => {
                write!(f, "order {} ended as {}", report.order_id, report.status)
            }
        }
    }
}

/// 매수/매도 결과.
///
/// 예상 가능한 비즈니스 실패는 `success == false`와 실패 사유로 표현됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeResult {
    /// 성공 여부
    pub success: bool,
    /// 심볼 (예: "BTC/USDT")
    pub symbol: String,
    /// 주문 방향
    pub side: Side,
    /// 주문 크기 (매수는 금액 또는 수량, 매도는 수량)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<Decimal>,
    /// 거래소 주문 보고서
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<OrderReport>,
    /// 실패 사유 (실패한 경우)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl TradeResult {
    /// 성공 결과 생성.
    pub fn success(symbol: impl Into<String>, side: Side, report: OrderReport) -> Self {
        Self {
            success: true,
            symbol: symbol.into(),
            side,
            requested: None,
            report: Some(report),
            failure: None,
        }
    }

    /// 실패 결과 생성.
    pub fn failure(symbol: impl Into<String>, side: Side, reason: FailureReason) -> Self {
        let report = match &reason {
            FailureReason::Unfilled(report) => Some(report.clone()),
            _ => None,
        };
        Self {
            success: false,
            symbol: symbol.into(),
            side,
            requested: None,
            report,
            failure: Some(reason),
        }
    }

    /// 요청 크기 추가.
    pub fn with_requested(mut self, requested: Decimal) -> Self {
        self.requested = Some(requested);
        self
    }

    /// 체결 수량.
    pub fn filled_quantity(&self) -> Quantity {
        self.report
            .as_ref()
            .map(|r| r.filled_quantity)
            .unwrap_or(Decimal::ZERO)
    }

    /// 평균 체결 가격.
    pub fn fill_price(&self) -> Option<Price> {
        self.report.as_ref().and_then(|r| r.fill_price())
    }

    /// 거래소 주문 ID.
    pub fn order_id(&self) -> Option<&str> {
        self.report.as_ref().map(|r| r.order_id.as_str())
    }
}
