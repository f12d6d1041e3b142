//! 청산 조건 판단.
//!
//! 손절과 트레일링 손절 판단 함수를 제공합니다. 판단 함수는 상태를 변경하지 않으며,
//! 최고가 갱신은 호출자가 `PositionReference::observe`로 수행합니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use spot_core::Price;

use crate::config::RiskConfig;

/// 가격에서 비율만큼 하락한 트리거 가격.
/// 예시: trigger_price(50000, 2) = 49000
fn trigger_price(reference: Price, pct: Decimal) -> Price {
    reference * (Decimal::ONE - pct / dec!(100))
}

/// 진입가 대비 손절 여부.
///
/// `last <= entry * (1 - pct/100)`일 때 true.
pub fn stop_loss(last: Price, entry_price: Price, pct: Decimal) -> bool {
    last <= trigger_price(entry_price, pct)
}

/// 진입 이후 최고가 대비 트레일링 손절 여부.
///
/// `last <= highest * (1 - pct/100)`일 때 true.
pub fn trailing_stop_loss(last: Price, highest_since_entry: Price, pct: Decimal) -> bool {
    last <= trigger_price(highest_since_entry, pct)
}

/// 청산 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// 진입가 기준 손절
    StopLoss,
    /// 최고가 기준 트레일링 손절
    TrailingStop,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::TrailingStop => write!(f, "trailing_stop"),
        }
    }
}

/// 열린 포지션의 기준 가격 상태.
///
/// 매수 체결 시 생성되어 포지션이 청산될 때까지 틱마다 갱신됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionReference {
    /// 진입 가격
    pub entry_price: Price,
    /// 진입 이후 관측된 최고가
    pub highest_price: Price,
}

impl PositionReference {
    /// 진입 가격으로 새 기준 상태를 생성합니다.
    pub fn new(entry_price: Price) -> Self {
        Self {
            entry_price,
            highest_price: entry_price,
        }
    }

    /// 새 가격을 반영합니다. 최고가는 감소하지 않습니다.
    pub fn observe(&mut self, last: Price) {
        self.highest_price = self.highest_price.max(last);
    }

    /// 설정된 비율로 청산 여부를 판단합니다.
    ///
    /// 두 조건이 모두 충족되면 `StopLoss`를 우선합니다.
    pub fn should_exit(&self, last: Price, config: &RiskConfig) -> Option<ExitReason> {
        if stop_loss(last, self.entry_price, config.stop_loss_pct) {
            Some(ExitReason::StopLoss)
        } else if trailing_stop_loss(last, self.highest_price, config.trailing_stop_pct) {
            Some(ExitReason::TrailingStop)
        } else {
            None
        }
    }
}
