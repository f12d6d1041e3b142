//! 정밀한 금융 계산을 위한 Decimal 유틸리티.
//!
//! 거래소의 소수점 정밀도와 로트 단위(최소 수량 증분) 규칙에 맞춘
//! 라운딩 함수를 제공합니다. 모든 라운딩은 0 방향(내림)으로 수행되어
//! 결과가 입력값을 넘지 않습니다.

use rust_decimal::{Decimal, RoundingStrategy};

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// 주문 수량을 위한 타입.
pub type Quantity = Decimal;

/// Decimal 연산을 위한 확장 트레이트.
pub trait DecimalExt {
    /// 지정된 소수점 자릿수에서 0 방향으로 자릅니다.
    fn floor_dp(&self, dp: u32) -> Decimal;

    /// 스텝의 배수 중 자기 자신 이하의 가장 큰 값을 반환합니다 (`x - x % step`).
    ///
    /// 스텝이 0 이하이면 값을 그대로 반환합니다.
    fn floor_to_step(&self, step: Decimal) -> Decimal;

    /// 값이 스텝의 배수인지 확인합니다.
    fn is_multiple_of(&self, step: Decimal) -> bool;
}

impl DecimalExt for Decimal {
    fn floor_dp(&self, dp: u32) -> Decimal {
        self.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
    }

    fn floor_to_step(&self, step: Decimal) -> Decimal {
        if step <= Decimal::ZERO {
            return *self;
        }
        *self - (*self % step)
    }

    fn is_multiple_of(&self, step: Decimal) -> bool {
        if step <= Decimal::ZERO {
            return true;
        }
        (*self % step).is_zero()
    }
}

/// 수량을 로트 그리드와 소수점 정밀도에 맞춥니다.
///
/// 모듈러 차감을 먼저 수행하고 그 다음에 정밀도 라운딩을 적용합니다.
/// 순서를 바꾸면 반올림된 값이 로트 그리드를 벗어날 수 있습니다.
pub fn round_to_lot(quantity: Quantity, lot_size: Decimal, precision: u32) -> Quantity {
    quantity
        .floor_to_step(lot_size)
        .floor_dp(precision)
        .normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_floor_dp() {
        assert_eq!(dec!(1.23456).floor_dp(2), dec!(1.23));
        assert_eq!(dec!(99.999).floor_dp(2), dec!(99.99));
        assert_eq!(dec!(5).floor_dp(2), dec!(5));
    }

    #[test]
    fn test_floor_to_step() {
        assert_eq!(dec!(0.0057).floor_to_step(dec!(0.001)), dec!(0.005));
        assert_eq!(dec!(12.5).floor_to_step(dec!(5)), dec!(10));
        assert_eq!(dec!(12.5).floor_to_step(Decimal::ZERO), dec!(12.5));
    }

    #[test]
    fn test_round_to_lot_spec_example() {
        // 100 USDT / 20000 = 0.005, 로트 0.001
        let qty = dec!(100) / dec!(20000);
        assert_eq!(round_to_lot(qty, dec!(0.001), 8), dec!(0.005));
    }

    #[test]
    fn test_round_to_lot_precision_after_modulus() {
        // 로트 0.05, 정밀도 1자리: 0.37 -> 0.35 -> 0.3
        assert_eq!(round_to_lot(dec!(0.37), dec!(0.05), 1), dec!(0.3));
    }

    proptest! {
        #[test]
        fn prop_round_to_lot_never_exceeds_and_stays_on_grid(
            units in 0u64..10_000_000,
            scale in 0u32..8,
            lot_units in 1u64..1000,
            lot_scale in 0u32..6,
        ) {
            let quantity = Decimal::new(units as i64, scale);
            let lot = Decimal::new(lot_units as i64, lot_scale);
            let rounded = round_to_lot(quantity, lot, 8);

            prop_assert!(rounded <= quantity);
            prop_assert!(rounded >= Decimal::ZERO);
            prop_assert!(rounded.is_multiple_of(lot));
        }
    }
}
