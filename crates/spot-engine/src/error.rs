//! 엔진 치명적 에러 타입.
//!
//! 잔고 부족이나 정밀도 거부 같은 비즈니스 실패는 여기에 속하지 않으며
//! `TradeResult`로 반환됩니다.

use spot_core::CoreError;
use spot_exchange::ExchangeError;
use spot_risk::ConfigValidationError;
use thiserror::Error;

/// 호출자에게 즉시 올려야 하는 엔진 에러.
#[derive(Debug, Error)]
pub enum EngineError {
    /// 인증 실패 등 어댑터 치명적 에러
    #[error("Fatal exchange fault: {0}")]
    Exchange(#[from] ExchangeError),

    /// 초기 연결 실패
    #[error("Failed to connect account {account}: {source}")]
    Connect {
        account: String,
        #[source]
        source: ExchangeError,
    },

    /// 잘못된 리스크 설정
    #[error("Invalid risk configuration: {0}")]
    InvalidConfig(#[from] ConfigValidationError),

    /// 설정 로드 실패
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// 엔진 작업을 위한 Result 타입.
pub type EngineResult<T> = Result<T, EngineError>;
