//! 심볼 정의.
//!
//! 현물 거래쌍은 기준 자산과 호가 자산으로 구성됩니다.
//! 예: `BTCUSDT`는 기준 자산 BTC, 호가 자산 USDT.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// 거래 가능한 현물 거래쌍을 나타내는 심볼.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    /// 기준 자산 (예: BTC)
    pub base: String,
    /// 호가 자산 (예: USDT)
    pub quote: String,
}

impl Symbol {
    /// 새 심볼을 생성합니다.
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }

    /// 거래쌍 문자열과 호가 통화로부터 심볼을 파싱합니다.
    ///
    /// `"BTCUSDT"`와 `"BTC/USDT"` 형식을 모두 받습니다. 거래쌍이 호가 통화로
    /// 끝나지 않거나 기준 자산이 비어 있으면 검증 에러를 반환합니다.
    pub fn from_pair(pair: &str, quote: &str) -> CoreResult<Self> {
        let pair = pair.trim().to_uppercase();
        let quote = quote.trim().to_uppercase();

        if quote.is_empty() {
            return Err(CoreError::InvalidInput("empty quote currency".into()));
        }

        let base = match pair.split_once('/') {
            Some((base, q)) if q == quote => base.to_string(),
            Some(_) => {
                return Err(CoreError::InvalidInput(format!(
                    "symbol {} is not quoted in {}",
                    pair, quote
                )))
            }
            None => match pair.strip_suffix(quote.as_str()) {
                Some(base) => base.to_string(),
                None => {
                    return Err(CoreError::InvalidInput(format!(
                        "symbol {} is not quoted in {}",
                        pair, quote
                    )))
                }
            },
        };

        if base.is_empty() || !base.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidInput(format!("invalid base asset in {}", pair)));
        }

        Ok(Self { base, quote })
    }

    /// 거래소 형식의 심볼 문자열을 반환합니다 (예: `BTCUSDT`).
    pub fn exchange_symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}
