//! # Dominance Core
//!
//! BTC 도미넌스 수집기의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 수집기 전반에서 사용되는 기본 타입을 제공합니다:
//! - 데이터 제공자 바(OHLCV) 및 간격 정의
//! - 일별 레코드(`DailyRecord`)와 레코드 출처 구분
//! - 필드 패치 모델과 병합 규칙 (과거/실시간 경로)
//! - UTC 일자 계산
//! - 로깅 인프라

pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
