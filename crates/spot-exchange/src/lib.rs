//! 거래소 기능 인터페이스와 어댑터.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Exchange trait: 엔진이 소비하는 통합 거래소 인터페이스
//! - 정규화된 잔고/심볼 메타데이터/취소 응답 타입
//! - Binance 어댑터 (전송 계층 주입) 및 응답 정규화
//! - 페이퍼 거래소 (메모리 내 어댑터, 데모 및 테스트용)
//! - 계좌 설정에서 어댑터를 고르는 팩토리

pub mod binance;
pub mod error;
pub mod factory;
pub mod paper;
pub mod traits;

pub use binance::{BinanceConfig, BinanceExchange, BinanceTransport};
pub use error::*;
pub use factory::ExchangeFactory;
pub use paper::{PaperConfig, PaperExchange};
pub use traits::*;
