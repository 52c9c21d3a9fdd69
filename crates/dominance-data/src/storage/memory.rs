//! 인메모리 문서 저장소.
//!
//! 레코드를 JSON 문서로 보관합니다. `$set` 방식으로 알려진 필드만 덮어쓰고,
//! 패치의 `unset` 필드는 매 쓰기마다 제거합니다.

use crate::storage::RecordStore;
use crate::Result;
use async_trait::async_trait;
use dominance_core::{apply_patch, DailyRecord, RecordPatch};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

type Document = Map<String, Value>;

/// `timestamp_ms`로 정렬된 인메모리 컬렉션.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    documents: RwLock<BTreeMap<i64, Document>>,
}

impl MemoryRecordStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 원시 문서를 그대로 넣습니다. 레거시 필드가 남은 문서를 재현할 때 사용합니다.
    pub async fn insert_raw(&self, timestamp_ms: i64, document: Document) {
        self.documents.write().await.insert(timestamp_ms, document);
    }

    /// 원시 문서를 조회합니다.
    pub async fn raw(&self, timestamp_ms: i64) -> Option<Document> {
        self.documents.read().await.get(&timestamp_ms).cloned()
    }
}

fn decode(document: &Document) -> Result<DailyRecord> {
    Ok(serde_json::from_value(Value::Object(document.clone()))?)
}

fn encode(record: &DailyRecord) -> Result<Document> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(crate::DataError::SerializationError(format!(
            "record encoded as non-object: {other}"
        ))),
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn upsert(&self, patch: &RecordPatch) -> Result<DailyRecord> {
        let mut documents = self.documents.write().await;

        let existing = documents
            .get(&patch.timestamp_ms)
            .map(decode)
            .transpose()?;
        let next = apply_patch(existing.as_ref(), patch);

        let document = documents.entry(patch.timestamp_ms).or_default();
        for (key, value) in encode(&next)? {
            document.insert(key, value);
        }
        for field in patch.unset {
            document.remove(*field);
        }

        debug!(
            timestamp_ms = patch.timestamp_ms,
            inserted = existing.is_none(),
            "document upserted"
        );
        Ok(next)
    }

    async fn find_one(&self, timestamp_ms: i64) -> Result<Option<DailyRecord>> {
        self.documents
            .read()
            .await
            .get(&timestamp_ms)
            .map(decode)
            .transpose()
    }

    async fn latest(&self) -> Result<Option<DailyRecord>> {
        self.documents
            .read()
            .await
            .values()
            .next_back()
            .map(decode)
            .transpose()
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.documents.read().await.len() as u64)
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut documents = self.documents.write().await;
        let deleted = documents.len() as u64;
        documents.clear();
        Ok(deleted)
    }
}
