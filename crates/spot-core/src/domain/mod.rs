//! 트레이딩 운영을 위한 도메인 모델.

mod balance;
mod order;

pub use balance::*;
pub use order::*;
