//! 과거/실시간 경로의 병합 규칙.
//!
//! 필드 소유권:
//! - 과거 경로는 `day/open/high/low/close/volume`을 한 묶음으로 덮어씁니다.
//! - 실시간 경로는 `current_*`와 `last_update`를 소유하고, `high`는 올리기만,
//!   `low`는 내리기만 하며 `close`는 마지막 기록이 이깁니다.
//! - `volume`과 `open`은 실시간 경로가 절대 수정하지 않습니다.

use crate::domain::patch::{FieldOp, RecordPatch, LEGACY_FIELDS};
use crate::domain::record::{DailyRecord, PriceField, RecordKind};
use crate::types::{day_start_ms, Bar};
use chrono::{DateTime, NaiveDate, Utc};

/// 제공자의 확정 일봉으로 `day` 레코드를 갱신하는 패치.
///
/// 기존 레코드의 `current_*`, `last_update`, `record_kind`는 유지됩니다.
pub fn historical_patch(day: NaiveDate, bar: &Bar) -> RecordPatch {
    let mut on_insert = DailyRecord::empty(day, RecordKind::Historical);
    on_insert.open = bar.open;
    on_insert.high = bar.high;
    on_insert.low = bar.low;
    on_insert.close = bar.close;
    on_insert.volume = bar.volume;

    RecordPatch {
        timestamp_ms: day_start_ms(day),
        on_insert,
        on_update: vec![
            FieldOp::SetDay(day),
            FieldOp::Set(PriceField::Open, bar.open),
            FieldOp::Set(PriceField::High, bar.high),
            FieldOp::Set(PriceField::Low, bar.low),
            FieldOp::Set(PriceField::Close, bar.close),
            FieldOp::Set(PriceField::Volume, bar.volume),
        ],
        unset: LEGACY_FIELDS,
    }
}

/// 최신 장중 샘플로 `day`(벽시계 UTC 기준 오늘) 레코드를 갱신하는 패치.
///
/// 레코드가 없으면 샘플로 가격 필드와 `current_*`를 채워 생성하며,
/// 샘플 거래량은 `current_volume`에만 기록합니다.
pub fn realtime_patch(day: NaiveDate, sample: &Bar, now: DateTime<Utc>) -> RecordPatch {
    let mut on_insert = DailyRecord::empty(day, RecordKind::RealtimeSeeded);
    on_insert.open = sample.open;
    on_insert.high = sample.high;
    on_insert.low = sample.low;
    on_insert.close = sample.close;
    on_insert.current_open = sample.open;
    on_insert.current_high = sample.high;
    on_insert.current_low = sample.low;
    on_insert.current_close = sample.close;
    on_insert.current_volume = sample.volume;
    on_insert.last_update = Some(now);

    let mut on_update = vec![
        FieldOp::Set(PriceField::Close, sample.close),
        FieldOp::Set(PriceField::CurrentOpen, sample.open),
        FieldOp::Set(PriceField::CurrentHigh, sample.high),
        FieldOp::Set(PriceField::CurrentLow, sample.low),
        FieldOp::Set(PriceField::CurrentClose, sample.close),
        FieldOp::Set(PriceField::CurrentVolume, sample.volume),
        FieldOp::SetLastUpdate(now),
    ];
    if let Some(high) = sample.high {
        on_update.push(FieldOp::Max(PriceField::High, high));
    }
    if let Some(low) = sample.low {
        on_update.push(FieldOp::Min(PriceField::Low, low));
    }

    RecordPatch {
        timestamp_ms: day_start_ms(day),
        on_insert,
        on_update,
        unset: LEGACY_FIELDS,
    }
}
