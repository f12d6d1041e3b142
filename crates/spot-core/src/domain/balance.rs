//! 자산 잔고 및 거래 메타데이터.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{round_to_lot, Quantity};

/// 심볼별 거래 규칙.
///
/// 심볼당 첫 거래 시 지연 조회되어 계좌 세션 동안 캐시되며,
/// 캐시된 이후에는 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingMetadata {
    /// 거래소 형식 심볼
    pub symbol: String,
    /// 수량/금액에 허용되는 소수점 자릿수
    pub precision: u32,
    /// 최소 수량 증분 (로트 단위)
    pub lot_size: Decimal,
}

impl TradingMetadata {
    /// 새 메타데이터를 생성합니다.
    pub fn new(symbol: impl Into<String>, precision: u32, lot_size: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            precision,
            lot_size,
        }
    }

    /// 수량을 이 심볼의 로트 그리드에 맞춰 내림합니다.
    pub fn round_quantity(&self, quantity: Quantity) -> Quantity {
        round_to_lot(quantity, self.lot_size, self.precision)
    }
}

/// 자산별 잔고.
///
/// 잔고 갱신 또는 주문 체결 확인에 의해서만 변경됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    /// 자산 심볼 (예: "BTC")
    pub asset: String,
    /// 사용 가능한 수량
    pub available: Decimal,
    /// 주문에 묶인 수량
    pub pending: Decimal,
    /// 이 자산을 기준으로 거래한 심볼의 메타데이터
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TradingMetadata>,
}

impl AssetBalance {
    /// 새 잔고를 생성합니다. 음수 값은 0으로 고정됩니다.
    pub fn new(asset: impl Into<String>, available: Decimal, pending: Decimal) -> Self {
        Self {
            asset: asset.into().to_uppercase(),
            available: available.max(Decimal::ZERO),
            pending: pending.max(Decimal::ZERO),
            metadata: None,
        }
    }

    /// 총 잔고 (사용 가능 + 묶인 수량).
    pub fn total(&self) -> Decimal {
        self.available + self.pending
    }
}
