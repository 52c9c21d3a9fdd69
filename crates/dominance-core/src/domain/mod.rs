//! 일별 레코드 도메인 모델과 병합 규칙.

mod merge;
mod patch;
mod record;

pub use merge::*;
pub use patch::*;
pub use record::*;
