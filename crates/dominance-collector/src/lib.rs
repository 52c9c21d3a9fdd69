//! BTC 도미넌스 수집기.
//!
//! 이 crate는 두 개의 독립 루프와 관리 명령을 제공합니다:
//! - 과거 경로: 매일 정해진 UTC 시각에 확정 일봉을 병합
//! - 실시간 경로: 짧은 주기로 당일 샘플을 병합하고 신선도 모니터 호출
//! - 일회성 백필(기존 CSV 가져오기 포함)과 전체 삭제(purge)

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use stats::CollectionStats;
