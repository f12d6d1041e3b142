//! 주문 실행 및 계좌 관리.
//!
//! 이 crate는 다음을 제공합니다:
//! - 거래소 잔고를 캐시하는 잔고 원장
//! - 주문을 제출하고 최종 상태까지 해결하는 주문 제출기
//! - 원장, 사이저, 제출기를 묶는 계좌 엔진
//!
//! # 예제
//!
//! ```rust,ignore
//! use spot_engine::{AccountEngine, EngineConfig};
//!
//! let engine = AccountEngine::connect("main", exchange, EngineConfig::default()).await?;
//! let result = engine.buy("BTC/USDT", "USDT", None).await?;
//! if !result.success {
//!     // 실패 사유 확인
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod result;
pub mod submitter;

// 주요 타입 재내보내기
pub use config::EngineConfig;
pub use engine::AccountEngine;
pub use error::{EngineError, EngineResult};
pub use ledger::{BalanceLedger, BalanceQuery, BalanceView};
pub use result::{FailureReason, TradeResult};
pub use submitter::{OrderSubmitter, PollPolicy, SubmitOutcome};
