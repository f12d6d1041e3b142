//! 리스크 관리 시스템.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 리스크 설정과 검증
//! - 포지션 사이징 (최소 잔고, 예산, 로트 라운딩)
//! - 손절/트레일링 손절 판단
//!
//! # 예제
//!
//! ```rust,ignore
//! use spot_risk::{BuyContext, PositionSizer, RiskConfig};
//!
//! let sizer = PositionSizer::new(RiskConfig::default());
//! let sizing = sizer.size_buy(&BuyContext {
//!     quote: "USDT",
//!     available,
//!     pending,
//!     metadata: &metadata,
//!     limit_price: None,
//! })?;
//! ```

pub mod config;
pub mod exit;
pub mod position_sizing;

// 주요 타입 재내보내기
pub use config::{ConfigValidationError, RiskConfig};
pub use exit::{stop_loss, trailing_stop_loss, ExitReason, PositionReference};
pub use position_sizing::{round_to_lot, BuyContext, BuySizing, PositionSizer, SizingError};
