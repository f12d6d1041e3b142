//! 핵심 도메인 에러 타입.
//!
//! 네트워크 호출 이전에 잡아낼 수 있는 검증 실패와 설정 에러를 정의합니다.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 입력 (잘못된 심볼, 음수 수량 등)
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// 네트워크 호출 전에 거부되어야 하는 검증 에러인지 확인합니다.
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::InvalidInput(_))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_validation() {
        let err = CoreError::InvalidInput("negative quantity".to_string());
        assert!(err.is_validation());

        let err = CoreError::NotFound("DOGE".to_string());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_error_display() {
        let err = CoreError::NotFound("DOGE".to_string());
        assert_eq!(err.to_string(), "찾을 수 없음: DOGE");
    }
}
