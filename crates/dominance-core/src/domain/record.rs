//! 일별 레코드.

use crate::error::CoreError;
use crate::types::day_start_ms;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 레코드를 처음 생성한 경로.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// 과거(일봉) 병합이 생성
    Historical,
    /// 실시간 샘플이 먼저 도착해 생성
    RealtimeSeeded,
}

impl RecordKind {
    /// 저장소에 기록되는 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Historical => "historical",
            Self::RealtimeSeeded => "realtime_seeded",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "historical" => Ok(Self::Historical),
            "realtime_seeded" => Ok(Self::RealtimeSeeded),
            other => Err(CoreError::InvalidRecordKind(other.to_string())),
        }
    }
}

/// 가격/거래량 필드 식별자.
///
/// `open..volume`은 과거 경로가, `current_*`는 실시간 경로가 소유합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
    CurrentOpen,
    CurrentHigh,
    CurrentLow,
    CurrentClose,
    CurrentVolume,
}

impl PriceField {
    /// 문서 필드명이자 테이블 컬럼명.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Volume => "volume",
            Self::CurrentOpen => "current_open",
            Self::CurrentHigh => "current_high",
            Self::CurrentLow => "current_low",
            Self::CurrentClose => "current_close",
            Self::CurrentVolume => "current_volume",
        }
    }
}

/// 하루(UTC)에 하나씩 존재하는 OHLCV 레코드.
///
/// `timestamp_ms`(해당 일자 00:00 UTC의 epoch 밀리초)가 고유 키입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub day: NaiveDate,
    pub timestamp_ms: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub current_open: Option<f64>,
    pub current_high: Option<f64>,
    pub current_low: Option<f64>,
    pub current_close: Option<f64>,
    pub current_volume: Option<f64>,
    /// 마지막 실시간 기록 시각
    pub last_update: Option<DateTime<Utc>>,
    pub record_kind: RecordKind,
}

impl DailyRecord {
    /// 모든 값이 비어 있는 레코드를 생성합니다.
    pub fn empty(day: NaiveDate, record_kind: RecordKind) -> Self {
        Self {
            day,
            timestamp_ms: day_start_ms(day),
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            current_open: None,
            current_high: None,
            current_low: None,
            current_close: None,
            current_volume: None,
            last_update: None,
            record_kind,
        }
    }

    /// 필드 값을 읽습니다.
    pub fn price(&self, field: PriceField) -> Option<f64> {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
            PriceField::Volume => self.volume,
            PriceField::CurrentOpen => self.current_open,
            PriceField::CurrentHigh => self.current_high,
            PriceField::CurrentLow => self.current_low,
            PriceField::CurrentClose => self.current_close,
            PriceField::CurrentVolume => self.current_volume,
        }
    }

    /// 필드에 대한 가변 참조.
    pub fn price_mut(&mut self, field: PriceField) -> &mut Option<f64> {
        match field {
            PriceField::Open => &mut self.open,
            PriceField::High => &mut self.high,
            PriceField::Low => &mut self.low,
            PriceField::Close => &mut self.close,
            PriceField::Volume => &mut self.volume,
            PriceField::CurrentOpen => &mut self.current_open,
            PriceField::CurrentHigh => &mut self.current_high,
            PriceField::CurrentLow => &mut self.current_low,
            PriceField::CurrentClose => &mut self.current_close,
            PriceField::CurrentVolume => &mut self.current_volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_round_trip_str() {
        assert_eq!("historical".parse::<RecordKind>().unwrap(), RecordKind::Historical);
        assert_eq!(RecordKind::RealtimeSeeded.as_str(), "realtime_seeded");
        assert!("latest".parse::<RecordKind>().is_err());
    }

    #[test]
    fn test_record_serializes_kind_as_snake_case() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let record = DailyRecord::empty(day, RecordKind::RealtimeSeeded);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["record_kind"], "realtime_seeded");
        assert_eq!(json["timestamp_ms"], 1_714_521_600_000i64);
        assert_eq!(json["day"], "2024-05-01");
    }

    #[test]
    fn test_price_mut_targets_field() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut record = DailyRecord::empty(day, RecordKind::Historical);
        *record.price_mut(PriceField::CurrentLow) = Some(57.1);
        assert_eq!(record.current_low, Some(57.1));
        assert_eq!(record.price(PriceField::Low), None);
    }
}
