//! 데이터 제공자 OHLCV 바.

use crate::types::day::utc_day;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 하나의 시간 구간에 대한 OHLCV 샘플.
///
/// 제공자가 "not-a-number" 또는 누락으로 보고한 값은 `None`입니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// 구간 시작 시각 (UTC)
    pub timestamp: DateTime<Utc>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl Bar {
    /// 모든 가격이 채워진 바를 생성합니다.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Option<f64>,
    ) -> Self {
        Self {
            timestamp,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume,
        }
    }

    /// 바 시작 시각의 UTC 일자.
    pub fn day(&self) -> NaiveDate {
        utc_day(self.timestamp)
    }

    /// 가격 필드가 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.open.is_none() && self.high.is_none() && self.low.is_none() && self.close.is_none()
    }
}

/// 유한한 값만 남깁니다 (NaN/무한대는 누락으로 취급).
pub fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
