//! # Spot Core
//!
//! 현물 트레이딩 엔진의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 엔진 전반에서 사용되는 기본 타입을 제공합니다:
//! - 주문 요청, 주문 엔티티, 거래소 주문 보고서
//! - 심볼(기준/호가 자산) 정의
//! - 정밀도/로트 단위 라운딩을 위한 Decimal 유틸리티
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
