//! 설정 관리.
//!
//! TOML 파일과 환경 변수(`SPOT__` 접두사)를 계층적으로 합쳐 설정을 로드합니다.
//! 프로세스 전역의 가변 기본값은 두지 않으며, 로드된 값은 생성 시점에
//! 각 컴포넌트로 전달됩니다.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CoreResult;
use crate::logging::LogConfig;

/// 환경 변수 오버라이드 접두사.
pub const ENV_PREFIX: &str = "SPOT";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 로깅 설정
    #[serde(default)]
    pub logging: LogConfig,
    /// 거래소 계좌 설정
    #[serde(default)]
    pub exchange: ExchangeSettings,
}

/// 거래소 계좌 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeSettings {
    /// 거래소 이름 (예: "binance", "paper")
    pub name: String,
    /// 계좌 식별자 (로그와 락 키에 사용)
    #[serde(default = "default_account")]
    pub account: String,
    /// 테스트넷 사용 여부
    #[serde(default)]
    pub testnet: bool,
    /// 서명 요청의 수신 윈도우 (밀리초)
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
}

fn default_account() -> String {
    "main".to_string()
}

fn default_recv_window_ms() -> u64 {
    5000
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            name: "paper".to_string(),
            account: default_account(),
            testnet: false,
            recv_window_ms: default_recv_window_ms(),
        }
    }
}

/// 파일(선택)과 환경 변수에서 설정을 계층적으로 로드합니다.
///
/// `.env` 파일이 있으면 먼저 읽어 환경 변수에 반영합니다.
/// 환경 변수는 `{prefix}__SECTION__KEY` 형식으로 파일 값을 덮어씁니다.
pub fn load_layered<T: DeserializeOwned>(path: Option<&Path>, prefix: &str) -> CoreResult<T> {
    dotenvy::dotenv().ok();

    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    builder = builder.add_source(
        config::Environment::with_prefix(prefix)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    Ok(config.try_deserialize()?)
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        load_layered(Some(path.as_ref()), ENV_PREFIX)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> CoreResult<Self> {
        Self::load("config/default.toml")
    }
}
