//! 필드 단위 패치.
//!
//! 병합 규칙은 스냅샷을 읽지 않고 패치만 만듭니다. 저장소는 패치를 단일
//! upsert로 적용하므로 read-modify-write 경합이 생기지 않습니다.
//!
//! - 레코드가 없으면 `on_insert` 전체를 삽입합니다.
//! - 레코드가 있으면 `on_update` 연산을 순서대로 적용합니다.
//! - 어느 경우든 `unset`에 나열된 레거시 필드는 제거됩니다.

use crate::domain::record::{DailyRecord, PriceField};
use chrono::{DateTime, NaiveDate, Utc};

/// 모든 쓰기에서 제거되는 레거시 필드.
pub const LEGACY_FIELDS: &[&str] = &["symbol"];

/// 기존 레코드에 적용하는 단일 필드 연산.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldOp {
    /// 값을 그대로 덮어씀
    Set(PriceField, Option<f64>),
    /// 현재 값보다 클 때만 기록 (현재 값이 없으면 기록)
    Max(PriceField, f64),
    /// 현재 값보다 작을 때만 기록 (현재 값이 없으면 기록)
    Min(PriceField, f64),
    SetDay(NaiveDate),
    SetLastUpdate(DateTime<Utc>),
}

impl FieldOp {
    /// 연산 대상 필드명.
    pub fn field_name(&self) -> &'static str {
        match self {
            FieldOp::Set(field, _) | FieldOp::Max(field, _) | FieldOp::Min(field, _) => {
                field.name()
            }
            FieldOp::SetDay(_) => "day",
            FieldOp::SetLastUpdate(_) => "last_update",
        }
    }

    /// 레코드에 연산을 적용합니다.
    pub fn apply(&self, record: &mut DailyRecord) {
        match *self {
            FieldOp::Set(field, value) => *record.price_mut(field) = value,
            FieldOp::Max(field, value) => {
                let slot = record.price_mut(field);
                if slot.map_or(true, |current| value > current) {
                    *slot = Some(value);
                }
            }
            FieldOp::Min(field, value) => {
                let slot = record.price_mut(field);
                if slot.map_or(true, |current| value < current) {
                    *slot = Some(value);
                }
            }
            FieldOp::SetDay(day) => record.day = day,
            FieldOp::SetLastUpdate(at) => record.last_update = Some(at),
        }
    }
}

/// 하나의 일별 레코드에 대한 upsert 패치.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPatch {
    /// 대상 레코드 키
    pub timestamp_ms: i64,
    /// 레코드가 없을 때 삽입할 전체 레코드
    pub on_insert: DailyRecord,
    /// 레코드가 있을 때 적용할 연산
    pub on_update: Vec<FieldOp>,
    /// 제거할 레거시 필드
    pub unset: &'static [&'static str],
}

impl RecordPatch {
    /// 패치가 건드리는 필드명 목록 (`on_update` 기준).
    pub fn touched_fields(&self) -> Vec<&'static str> {
        self.on_update.iter().map(FieldOp::field_name).collect()
    }
}

/// 패치를 적용한 결과 레코드를 계산합니다.
///
/// 저장소 upsert의 기준 의미론입니다.
pub fn apply_patch(existing: Option<&DailyRecord>, patch: &RecordPatch) -> DailyRecord {
    match existing {
        None => patch.on_insert.clone(),
        Some(current) => {
            let mut next = current.clone();
            for op in &patch.on_update {
                op.apply(&mut next);
            }
            next
        }
    }
}
