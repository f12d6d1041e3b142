//! 리스크 관리 설정.
//!
//! 포지션 사이징과 청산 판단에 쓰이는 설정 구조체를 정의합니다.
//! 세션 동안 변경되지 않으며 엔진 생성 시점에 전달됩니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 계좌 리스크 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// 단일 거래에 투입할 잔고 비율, (0, 1] 범위 (기본값: 0.1)
    #[serde(default = "default_risk_fraction")]
    pub risk_fraction: Decimal,

    /// 호가 통화별 최소 잔고 임계값
    /// 잔고가 이 값보다 적으면 매수하지 않습니다
    #[serde(default = "default_min_balances")]
    pub min_balances: HashMap<String, Decimal>,

    /// 진입가 대비 손절 비율 (기본값: 2%)
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,

    /// 최고가 대비 트레일링 손절 비율 (기본값: 1.5%)
    #[serde(default = "default_trailing_stop_pct")]
    pub trailing_stop_pct: Decimal,
}

// 기본값 함수들
fn default_risk_fraction() -> Decimal {
    dec!(0.1)
}

fn default_min_balances() -> HashMap<String, Decimal> {
    HashMap::from([
        ("USDT".to_string(), dec!(10)),
        ("BTC".to_string(), dec!(0.001)),
    ])
}

fn default_stop_loss_pct() -> Decimal {
    dec!(2)
}

fn default_trailing_stop_pct() -> Decimal {
    dec!(1.5)
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_fraction: default_risk_fraction(),
            min_balances: default_min_balances(),
            stop_loss_pct: default_stop_loss_pct(),
            trailing_stop_pct: default_trailing_stop_pct(),
        }
    }
}

impl RiskConfig {
    /// 기본값으로 새 RiskConfig를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 리스크 비율을 설정합니다.
    pub fn with_risk_fraction(mut self, fraction: Decimal) -> Self {
        self.risk_fraction = fraction;
        self
    }

    /// 호가 통화의 최소 잔고를 설정합니다.
    pub fn with_min_balance(mut self, quote: &str, minimum: Decimal) -> Self {
        self.min_balances.insert(quote.to_uppercase(), minimum);
        self
    }

    /// 호가 통화의 최소 잔고 임계값을 가져옵니다.
    /// 통화 이름은 대소문자를 구분하지 않으며, 설정되지 않은 통화는 0을 반환합니다.
    pub fn min_balance(&self, quote: &str) -> Decimal {
        self.min_balances
            .iter()
            .find(|(currency, _)| currency.eq_ignore_ascii_case(quote))
            .map(|(_, minimum)| *minimum)
            .unwrap_or(Decimal::ZERO)
    }

    /// 설정 값을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.risk_fraction <= Decimal::ZERO || self.risk_fraction > Decimal::ONE {
            return Err(ConfigValidationError::InvalidValue(
                "risk_fraction must be in (0, 1]".into(),
            ));
        }

        for (name, pct) in [
            ("stop_loss_pct", self.stop_loss_pct),
            ("trailing_stop_pct", self.trailing_stop_pct),
        ] {
            if pct < Decimal::ZERO || pct >= dec!(100) {
                return Err(ConfigValidationError::InvalidValue(format!(
                    "{} must be in [0, 100)",
                    name
                )));
            }
        }

        if let Some((quote, _)) = self.min_balances.iter().find(|(_, m)| m.is_sign_negative()) {
            return Err(ConfigValidationError::InvalidValue(format!(
                "min_balances.{} must not be negative",
                quote
            )));
        }

        Ok(())
    }
}

/// 설정 검증 오류.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RiskConfig::default();

        assert_eq!(config.risk_fraction, dec!(0.1));
        assert_eq!(config.min_balance("USDT"), dec!(10));
        assert_eq!(config.min_balance("btc"), dec!(0.001));
        assert_eq!(config.stop_loss_pct, dec!(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_quote_has_zero_minimum() {
        let config = RiskConfig::default();
        assert_eq!(config.min_balance("KRW"), Decimal::ZERO);
    }

    #[test]
    fn test_config_validation() {
        let invalid = RiskConfig::default().with_risk_fraction(dec!(1.5));
        assert!(invalid.validate().is_err());

        let invalid = RiskConfig::default().with_risk_fraction(Decimal::ZERO);
        assert!(invalid.validate().is_err());

        let full = RiskConfig::default().with_risk_fraction(Decimal::ONE);
        assert!(full.validate().is_ok());

        let mut invalid = RiskConfig::default();
        invalid.trailing_stop_pct = dec!(100);
        assert!(invalid.validate().is_err());

        let invalid = RiskConfig::default().with_min_balance("USDT", dec!(-1));
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: RiskConfig =
            serde_json::from_str(r#"{"risk_fraction": "0.25", "min_balances": {"USDT": "50"}}"#)
                .unwrap();

        assert_eq!(config.risk_fraction, dec!(0.25));
        assert_eq!(config.min_balance("USDT"), dec!(50));
        assert_eq!(config.min_balance("BTC"), Decimal::ZERO);
        assert_eq!(config.trailing_stop_pct, dec!(1.5));
    }
}
