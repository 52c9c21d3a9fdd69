//! 도메인 에러 타입.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 알 수 없는 바 간격
    #[error("잘못된 간격: {0}")]
    InvalidInterval(String),

    /// 알 수 없는 레코드 출처
    #[error("잘못된 레코드 출처: {0}")]
    InvalidRecordKind(String),
}
