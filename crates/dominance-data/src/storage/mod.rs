//! 저장소 구현.

pub mod memory;
pub mod postgres;

use crate::Result;
use async_trait::async_trait;
use dominance_core::{DailyRecord, RecordPatch};

/// 일별 레코드 컬렉션.
///
/// 각 쓰기는 고유 키(`timestamp_ms`)에 대한 단일 upsert이며,
/// 단일 레코드 쓰기의 원자성은 구현체가 보장합니다.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 패치를 원자적으로 적용하고 적용 후 레코드를 반환합니다.
    async fn upsert(&self, patch: &RecordPatch) -> Result<DailyRecord>;

    /// 키로 레코드를 조회합니다.
    async fn find_one(&self, timestamp_ms: i64) -> Result<Option<DailyRecord>>;

    /// 가장 최근 일자의 레코드를 조회합니다.
    async fn latest(&self) -> Result<Option<DailyRecord>>;

    /// 레코드 수.
    async fn count(&self) -> Result<u64>;

    /// 모든 레코드를 삭제하고 삭제된 수를 반환합니다.
    async fn delete_all(&self) -> Result<u64>;
}
