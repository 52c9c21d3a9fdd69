//! 일별 레코드 저장소.
//!
//! 이 crate는 다음을 제공합니다:
//! - `RecordStore` trait: 키 기반 upsert와 단건 조회
//! - 인메모리 문서 저장소 (테스트 및 DB 없는 실행용)
//! - PostgreSQL 저장소 (`INSERT .. ON CONFLICT` 단일 문장 upsert)

pub mod error;
pub mod storage;

pub use error::{DataError, Result};
pub use storage::memory::MemoryRecordStore;
pub use storage::postgres::{PgRecordStore, DEFAULT_TABLE};
pub use storage::RecordStore;
