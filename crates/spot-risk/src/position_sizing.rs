//! 포지션 크기 계산.
//!
//! 제공 기능:
//! - 리스크 비율과 잔고로부터 매수 금액/수량 계산
//! - 로트 그리드에 맞춘 매도 수량 계산
//!
//! 계산 순서는 고정되어 있습니다: 최소 잔고 확인, 예산 확인, 로트 라운딩.

use crate::config::RiskConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spot_core::{DecimalExt, OrderAmount, Price, Quantity, TradingMetadata};
use thiserror::Error;
use tracing::debug;

/// 사이징 실패 사유.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    /// 잔고가 호가 통화의 최소 임계값보다 적음
    #[error("Insufficient funds: balance {balance} below minimum {minimum}")]
    InsufficientFunds { balance: Decimal, minimum: Decimal },

    /// 목표 금액이 사용 가능 잔고를 초과
    #[error("Budget exceeded: spend {spend} exceeds available {available}")]
    BudgetExceeded { spend: Decimal, available: Decimal },

    /// 라운딩 후 수량이 0
    #[error("Quantity {quantity} is below lot size {lot_size}")]
    BelowLotSize { quantity: Decimal, lot_size: Decimal },

    /// 잘못된 입력 (음수 수량, 0 이하 가격 등)
    #[error("Invalid sizing input: {0}")]
    InvalidInput(String),
}

/// 매수 사이징 입력.
#[derive(Debug, Clone)]
pub struct BuyContext<'a> {
    /// 호가 통화 (최소 잔고 조회용)
    pub quote: &'a str,
    /// 호가 통화 사용 가능 잔고
    pub available: Decimal,
    /// 호가 통화 묶인 잔고
    pub pending: Decimal,
    /// 심볼 거래 메타데이터
    pub metadata: &'a TradingMetadata,
    /// 지정가 (없으면 시장가 매수)
    pub limit_price: Option<Price>,
}

/// 매수 사이징 결과.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuySizing {
    /// 리스크 비율로 계산된 목표 금액 (라운딩 전)
    pub spend: Decimal,
    /// 주문 크기: 시장가는 호가 금액, 지정가는 기준 수량
    pub amount: OrderAmount,
}

/// 설정된 리스크 비율에 따라 주문 크기를 계산하는 포지션 사이저.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: RiskConfig,
}

impl PositionSizer {
    /// 주어진 설정으로 새 포지션 사이저를 생성.
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// 현재 설정을 반환합니다.
    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// 호가 통화 잔고가 최소 임계값 이상인지 확인합니다.
    ///
    /// 메타데이터 조회 전에 호출할 수 있도록 사이징과 분리되어 있습니다.
    pub fn check_minimum(
        &self,
        quote: &str,
        available: Decimal,
        pending: Decimal,
    ) -> Result<(), SizingError> {
        let balance = available + pending;
        let minimum = self.config.min_balance(quote);
        if balance < minimum {
            return Err(SizingError::InsufficientFunds { balance, minimum });
        }
        Ok(())
    }

    /// 매수 주문 크기를 계산합니다.
    ///
    /// 목표 금액은 (사용 가능 + 묶인 잔고) × 리스크 비율이며,
    /// 사용 가능 잔고를 넘으면 `BudgetExceeded`로 실패합니다.
    pub fn size_buy(&self, ctx: &BuyContext<'_>) -> Result<BuySizing, SizingError> {
        if ctx.available.is_sign_negative() || ctx.pending.is_sign_negative() {
            return Err(SizingError::InvalidInput(format!(
                "negative balance: available {}, pending {}",
                ctx.available, ctx.pending
            )));
        }

        self.check_minimum(ctx.quote, ctx.available, ctx.pending)?;

        let balance = ctx.available + ctx.pending;
        let spend = balance
            .checked_mul(self.config.risk_fraction)
            .ok_or_else(|| SizingError::InvalidInput(format!("spend overflow: {}", balance)))?;
        if spend > ctx.available {
            return Err(SizingError::BudgetExceeded {
                spend,
                available: ctx.available,
            });
        }

        let amount = match ctx.limit_price {
            None => {
                let quote_amount = spend.floor_dp(ctx.metadata.precision).normalize();
                if quote_amount.is_zero() {
                    return Err(SizingError::BelowLotSize {
                        quantity: spend,
                        lot_size: ctx.metadata.lot_size,
                    });
                }
                OrderAmount::Quote(quote_amount)
            }
            Some(price) if price <= Decimal::ZERO => {
                return Err(SizingError::InvalidInput(format!(
                    "limit price must be positive: {}",
                    price
                )));
            }
            Some(price) => {
                let raw = spend.checked_div(price).ok_or_else(|| {
                    SizingError::InvalidInput(format!("quantity overflow: {} / {}", spend, price))
                })?;
                let quantity = round_to_lot(raw, ctx.metadata);
                if quantity.is_zero() {
                    return Err(SizingError::BelowLotSize {
                        quantity: raw,
                        lot_size: ctx.metadata.lot_size,
                    });
                }
                OrderAmount::Base(quantity)
            }
        };

        debug!(
            symbol = %ctx.metadata.symbol,
            %balance,
            %spend,
            amount = %amount.value(),
            "Buy sized"
        );

        Ok(BuySizing { spend, amount })
    }

    /// 매도 수량을 계산합니다.
    ///
    /// 수량을 지정하지 않으면 사용 가능 잔고 전체를 로트 그리드로 내림합니다.
    pub fn size_sell(
        &self,
        available: Quantity,
        requested: Option<Quantity>,
        metadata: &TradingMetadata,
    ) -> Result<Quantity, SizingError> {
        let raw = match requested {
            Some(q) if q <= Decimal::ZERO => {
                return Err(SizingError::InvalidInput(format!(
                    "sell quantity must be positive: {}",
                    q
                )));
            }
            Some(q) => q,
            None => available,
        };

        let quantity = round_to_lot(raw, metadata);
        if quantity > available {
            return Err(SizingError::InsufficientFunds {
                balance: available,
                minimum: quantity,
            });
        }
        if quantity.is_zero() {
            return Err(SizingError::BelowLotSize {
                quantity: raw,
                lot_size: metadata.lot_size,
            });
        }

        debug!(symbol = %metadata.symbol, %available, %quantity, "Sell sized");
        Ok(quantity)
    }
}

/// 수량을 메타데이터의 로트 그리드와 정밀도에 맞춰 내림합니다.
pub fn round_to_lot(quantity: Quantity, metadata: &TradingMetadata) -> Quantity {
    metadata.round_quantity(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn btc_usdt() -> TradingMetadata {
        TradingMetadata::new("BTCUSDT", 8, dec!(0.001))
    }

    fn sizer(min_usdt: Decimal) -> PositionSizer {
        PositionSizer::new(RiskConfig::default().with_min_balance("USDT", min_usdt))
    }

    fn ctx<'a>(meta: &'a TradingMetadata, available: Decimal, pending: Decimal) -> BuyContext<'a> {
        BuyContext {
            quote: "USDT",
            available,
            pending,
            metadata: meta,
            limit_price: None,
        }
    }

    #[test]
    fn test_limit_buy_example() {
        // 잔고 1000, 리스크 0.1, 최소 50 -> 100 / 20000 = 0.005
        let meta = btc_usdt();
        let mut context = ctx(&meta, dec!(1000), Decimal::ZERO);
        context.limit_price = Some(dec!(20000));

        let sizing = sizer(dec!(50)).size_buy(&context).unwrap();
        assert_eq!(sizing.spend, dec!(100));
        assert_eq!(sizing.amount, OrderAmount::Base(dec!(0.005)));
    }

    #[test]
    fn test_market_buy_uses_quote_amount() {
        let meta = TradingMetadata::new("BTCUSDT", 2, dec!(0.001));
        let sizing = sizer(dec!(10))
            .size_buy(&ctx(&meta, dec!(123.456), Decimal::ZERO))
            .unwrap();

        assert_eq!(sizing.amount, OrderAmount::Quote(dec!(12.34)));
    }

    #[test]
    fn test_below_minimum_is_insufficient_funds() {
        let meta = btc_usdt();
        let result = sizer(dec!(50)).size_buy(&ctx(&meta, dec!(30), dec!(10)));

        assert_eq!(
            result,
            Err(SizingError::InsufficientFunds {
                balance: dec!(40),
                minimum: dec!(50)
            })
        );
    }

    #[test]
    fn test_spend_on_locked_funds_is_budget_exceeded() {
        // 총 1000 중 990이 묶여 있으면 목표 금액 100 > 사용 가능 10
        let meta = btc_usdt();
        let result = sizer(dec!(10)).size_buy(&ctx(&meta, dec!(10), dec!(990)));

        assert!(matches!(result, Err(SizingError::BudgetExceeded { .. })));
    }

    #[test]
    fn test_limit_buy_below_lot_size() {
        let meta = TradingMetadata::new("BTCUSDT", 8, dec!(1));
        let mut context = ctx(&meta, dec!(100), Decimal::ZERO);
        context.limit_price = Some(dec!(20000));

        let result = sizer(Decimal::ZERO).size_buy(&context);
        assert!(matches!(result, Err(SizingError::BelowLotSize { .. })));
    }

    #[test]
    fn test_tiny_limit_price_is_invalid_input() {
        let meta = btc_usdt();
        let mut context = ctx(&meta, dec!(1000), Decimal::ZERO);
        context.limit_price = Some(Decimal::new(1, 28));

        let result = sizer(dec!(10)).size_buy(&context);
        assert!(matches!(result, Err(SizingError::InvalidInput(_))));
    }

    #[test]
    fn test_size_sell_full_balance() {
        let qty = sizer(Decimal::ZERO)
            .size_sell(dec!(0.0057), None, &btc_usdt())
            .unwrap();
        assert_eq!(qty, dec!(0.005));
    }

    #[test]
    fn test_size_sell_requested_quantity() {
        let s = sizer(Decimal::ZERO);
        let meta = btc_usdt();

        assert_eq!(s.size_sell(dec!(1), Some(dec!(0.0042)), &meta).unwrap(), dec!(0.004));
        assert!(matches!(
            s.size_sell(dec!(0.002), Some(dec!(0.005)), &meta),
            Err(SizingError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            s.size_sell(dec!(1), Some(dec!(-1)), &meta),
            Err(SizingError::InvalidInput(_))
        ));
        assert!(matches!(
            s.size_sell(dec!(0.0004), None, &meta),
            Err(SizingError::BelowLotSize { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_spend_never_exceeds_available(
            available in 0u64..10_000_000,
            pending in 0u64..10_000_000,
            risk_bp in 1u32..=10_000,
        ) {
            let meta = btc_usdt();
            let config = RiskConfig::default()
                .with_risk_fraction(Decimal::new(risk_bp as i64, 4))
                .with_min_balance("USDT", Decimal::ZERO);
            let available = Decimal::new(available as i64, 2);
            let pending = Decimal::new(pending as i64, 2);

            if let Ok(sizing) = PositionSizer::new(config).size_buy(&ctx(&meta, available, pending)) {
                prop_assert!(sizing.spend <= available);
                prop_assert!(sizing.amount.value() <= available);
            }
        }

        #[test]
        fn prop_sell_quantity_on_lot_grid(
            raw in 1u64..1_000_000_000,
            lot_exp in 0u32..6,
        ) {
            let lot = Decimal::new(1, lot_exp);
            let meta = TradingMetadata::new("XUSDT", 8, lot);
            let available = Decimal::new(raw as i64, 6);

            if let Ok(qty) = sizer(Decimal::ZERO).size_sell(available, None, &meta) {
                prop_assert!(qty <= available);
                prop_assert!(qty.is_multiple_of(lot));
            }
        }
    }
}
