//! 엔진 설정.
//!
//! 설정 파일의 `[engine]` 섹션과 `SPOT__ENGINE__*` 환경 변수에서 로드됩니다.

use serde::{Deserialize, Serialize};
use spot_core::{load_layered, CoreResult, ENV_PREFIX};
use spot_risk::RiskConfig;
use std::path::Path;

use crate::submitter::PollPolicy;

/// 계좌 엔진 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 리스크 설정
    #[serde(default)]
    pub risk: RiskConfig,
    /// 주문 해결 폴링 정책
    #[serde(default)]
    pub poll: PollPolicy,
    /// 기본 호가 통화
    #[serde(default = "default_quote")]
    pub default_quote: String,
}

fn default_quote() -> String {
    "USDT".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk: RiskConfig::default(),
            poll: PollPolicy::default(),
            default_quote: default_quote(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct EngineSection {
    #[serde(default)]
    engine: EngineConfig,
}

impl EngineConfig {
    /// 파일(선택)과 환경 변수에서 엔진 설정을 로드합니다.
    ///
    /// 파일이 없거나 `[engine]` 섹션이 없으면 기본값을 사용합니다.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let section: EngineSection = load_layered(path, ENV_PREFIX)?;
        Ok(section.engine)
    }

    /// 리스크 설정을 지정합니다.
    pub fn with_risk(mut self, risk: RiskConfig) -> Self {
        self.risk = risk;
        self
    }

    /// 폴링 정책을 지정합니다.
    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_load_engine_section() {
        let dir = std::env::temp_dir().join(format!("spot-engine-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("engine.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[logging]
level = "info"

[engine]
default_quote = "BTC"

[engine.risk]
risk_fraction = "0.2"
stop_loss_pct = "5"

[engine.poll]
timeout_ms = 3000
cancel_unfilled = false
"#
        )
        .unwrap();

        let config = EngineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.default_quote, "BTC");
        assert_eq!(config.risk.risk_fraction, dec!(0.2));
        assert_eq!(config.risk.stop_loss_pct, dec!(5));
        assert_eq!(config.risk.trailing_stop_pct, dec!(1.5));
        assert_eq!(config.poll.timeout_ms, 3000);
        assert_eq!(config.poll.interval_ms, 500);
        assert!(!config.poll.cancel_unfilled);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_bundled_default_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/default.toml");
        let config = EngineConfig::load(Some(&path)).unwrap();

        assert_eq!(config.risk.risk_fraction, dec!(0.1));
        assert_eq!(config.risk.min_balance("USDT"), dec!(10));
        assert_eq!(config.risk.min_balance("btc"), dec!(0.001));
        assert_eq!(config.poll, PollPolicy::default());
    }

    #[test]
    fn test_defaults_without_file() {
        let config = EngineConfig::load(None).unwrap();
        assert_eq!(config.poll, PollPolicy::default());
        assert!(config.risk.validate().is_ok());
    }
}
