//! UTC 일자 계산.
//!
//! 모든 계산은 UTC 기준이며 타임존 변환은 하지 않습니다.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// 시각이 속한 UTC 일자.
pub fn utc_day(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

/// UTC 일자의 시작 시각 (epoch 밀리초). 일별 레코드의 고유 키입니다.
pub fn day_start_ms(day: NaiveDate) -> i64 {
    day.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}
