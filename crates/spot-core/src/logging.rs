//! tracing을 사용한 로깅 인프라.
//!
//! 엔진 라이브러리 자체는 구독자를 설치하지 않습니다. 이 모듈은 엔진을
//! 사용하는 바이너리와 테스트가 구조화된 로그를 켤 수 있도록 돕습니다:
//! - **pretty**: 개발용 사람이 읽기 쉬운 형식
//! - **json**: 로그 집계용 JSON 형식
//! - **compact**: 한 줄 형식

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 색상이 포함된 사람이 읽기 쉬운 형식
    #[default]
    Pretty,
    /// JSON 형식
    Json,
    /// 간결한 한 줄 형식
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 로그 레벨 필터 (예: "info", "spot_engine=debug")
    #[serde(default = "default_level")]
    pub level: String,
    /// 출력 형식
    #[serde(default)]
    pub format: LogFormat,
    /// 파일명과 줄 번호 포함 여부
    #[serde(default)]
    pub with_file: bool,
    /// 대상(모듈 경로) 포함 여부
    #[serde(default = "default_true")]
    pub with_target: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::Pretty,
            with_file: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    /// 새 로그 설정을 생성합니다.
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// 로그 형식을 설정합니다.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// 환경 변수에서 설정을 생성합니다.
    ///
    /// 레벨은 `RUST_LOG`, 형식은 `SPOT_LOG_FORMAT`을 사용합니다.
    pub fn from_env() -> Self {
        Self {
            level: std::env::var("RUST_LOG").unwrap_or_else(|_| default_level()),
            format: std::env::var("SPOT_LOG_FORMAT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            ..Default::default()
        }
    }
}

/// 주어진 설정으로 전역 tracing 구독자를 설치합니다.
///
/// `RUST_LOG`가 설정되어 있으면 `level`보다 우선합니다.
/// 이미 구독자가 설치되어 있으면 에러를 반환합니다.
///
/// # 예제
///
/// ```no_run
/// use spot_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("spot_engine=debug").with_format(LogFormat::Json)).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    // 형식별 레이어 중 하나만 Some
    let pretty = (config.format == LogFormat::Pretty).then(|| {
        fmt::layer()
            .pretty()
            .with_file(config.with_file)
            .with_line_number(config.with_file)
            .with_target(config.with_target)
    });
    let json = (config.format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_file(config.with_file)
            .with_line_number(config.with_file)
            .with_target(config.with_target)
    });
    let compact = (config.format == LogFormat::Compact).then(|| {
        fmt::layer()
            .compact()
            .with_target(config.with_target)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .with(compact)
        .try_init()?;

    tracing::debug!(format = ?config.format, level = %config.level, "로깅 초기화 완료");
    Ok(())
}

/// 환경 변수에서 로깅을 초기화합니다.
pub fn init_logging_from_env() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging(LogConfig::from_env())
}

/// 계좌와 심볼 컨텍스트가 포함된 거래 span을 생성합니다.
///
/// ```rust,ignore
/// let span = trading_span!("buy", account, "BTC/USDT", Side::Buy);
/// ```
#[macro_export]
macro_rules! trading_span {
    ($op:expr, $account:expr, $symbol:expr) => {
        tracing::info_span!($op, account = %$account, symbol = %$symbol)
    };
    ($op:expr, $account:expr, $symbol:expr, $side:expr) => {
        tracing::info_span!($op, account = %$account, symbol = %$symbol, side = %$side)
    };
}
