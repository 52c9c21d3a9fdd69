//! 레코드 컬렉션 전체 삭제 (관리 명령).

use crate::Result;
use dominance_data::RecordStore;
use serde::Serialize;

/// 삭제 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// 삭제 전 레코드 수
    pub before: u64,
    /// 삭제된 레코드 수
    pub deleted: u64,
    /// 삭제 후 레코드 수
    pub after: u64,
}

/// 모든 레코드를 삭제하고 전후 개수를 보고합니다.
pub async fn purge(store: &dyn RecordStore) -> Result<PurgeReport> {
    let before = store.count().await?;
    tracing::info!(count = before, "삭제 전 레코드 수");

    let deleted = store.delete_all().await?;
    let after = store.count().await?;

    tracing::info!(before, deleted, after, "레코드 전체 삭제 완료");
    if after > 0 {
        tracing::warn!(remaining = after, "삭제 중 새 레코드가 기록됨");
    }

    Ok(PurgeReport {
        before,
        deleted,
        after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dominance_core::{historical_patch, Bar};
    use dominance_data::MemoryRecordStore;

    #[tokio::test]
    async fn test_purge_reports_counts() {
        let store = MemoryRecordStore::new();
        for d in 1..=3 {
            let day = NaiveDate::from_ymd_opt(2024, 9, d).unwrap();
            let ts = day.and_hms_opt(0, 0, 0).unwrap().and_utc();
            let bar = Bar::new(ts, 1.0, 2.0, 0.5, 1.5, Some(1.0));
            store.upsert(&historical_patch(day, &bar)).await.unwrap();
        }

        let report = purge(&store).await.unwrap();
        assert_eq!(
            report,
            PurgeReport {
                before: 3,
                deleted: 3,
                after: 0
            }
        );

        let report = purge(&store).await.unwrap();
        assert_eq!(report.before, 0);
        assert_eq!(report.deleted, 0);
    }
}
