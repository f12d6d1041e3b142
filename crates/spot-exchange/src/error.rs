//! 거래소 에러 타입.

use thiserror::Error;

/// 거래소 관련 에러.
///
/// 어댑터는 거래소별 에러 코드를 이 열거형으로 정규화합니다.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 거래소 연결 끊김
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited,

    /// API 에러 코드
    #[error("API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 정밀도/로트 단위 필터 위반
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// 타임스탬프 동기화 에러
    #[error("Timestamp error: {0}")]
    TimestampError(String),

    /// 잔고 부족
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// 계좌 수준 한도 도달 (최대 미체결 주문 수 등)
    #[error("Account limit reached: {0}")]
    AccountLimit(String),

    /// 주문을 찾을 수 없음
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// 심볼을 찾을 수 없음
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// 주문 거부됨
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),

    /// 지원되지 않는 작업
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl ExchangeError {
    /// 재시도 가능한 에러인지 확인.
    ///
    /// 엔진은 재시도하지 않으며, 호출자의 재시도 정책이 참고합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::NetworkError(_)
                | ExchangeError::Disconnected(_)
                | ExchangeError::RateLimited
                | ExchangeError::Timeout(_)
                | ExchangeError::TimestampError(_)
        )
    }

    /// 권장 재시도 대기 시간(밀리초) 반환.
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            ExchangeError::RateLimited => Some(60000),
            ExchangeError::NetworkError(_) => Some(1000),
            ExchangeError::Disconnected(_) => Some(5000),
            ExchangeError::Timeout(_) => Some(500),
            ExchangeError::TimestampError(_) => Some(100),
            _ => None,
        }
    }

    /// 인증 에러인지 확인.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ExchangeError::Unauthorized(_))
    }

    /// 호출자에게 즉시 올려야 하는 어댑터 치명적 에러인지 확인.
    ///
    /// 비즈니스 실패(잔고 부족, 정밀도 거부)는 치명적이지 않습니다.
    pub fn is_fatal(&self) -> bool {
        self.is_auth_error()
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}
