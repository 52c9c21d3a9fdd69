//! 기존 일봉 CSV 가져오기.
//!
//! 첫 번째 열은 바 시각이고 나머지 열은 이름(대소문자 무시)으로 찾습니다:
//! `open`, `high`, `low`, `close`, 선택적으로 `volume`. 다른 열은 무시합니다.
//!
//! ```text
//! datetime,symbol,open,high,low,close,volume
//! 2024-09-14 00:00:00,CRYPTOCAP:BTC.D,57.9,58.6,57.8,58.3,1000
//! ```

use crate::error::CollectorError;
use crate::modules::historical::merge_historical;
use crate::{CollectionStats, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use dominance_core::{finite, Bar};
use dominance_data::RecordStore;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

/// CSV에서 읽은 일봉.
#[derive(Debug, Default)]
pub struct CsvBars {
    /// 파싱된 바 (파일 순서)
    pub bars: Vec<Bar>,
    /// 파싱하지 못한 행 수
    pub rejected: usize,
}

struct Columns {
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: Option<usize>,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .skip(1)
                .position(|h| h.eq_ignore_ascii_case(name))
                .map(|i| i + 1)
        };
        let columns = Self {
            open: find("open"),
            high: find("high"),
            low: find("low"),
            close: find("close"),
            volume: find("volume"),
        };

        if columns.open.is_none()
            && columns.high.is_none()
            && columns.low.is_none()
            && columns.close.is_none()
        {
            return Err(CollectorError::Import(
                "가격 열(open/high/low/close)이 없습니다".to_string(),
            ));
        }
        Ok(columns)
    }
}

/// CSV 본문에서 일봉을 읽습니다.
///
/// 헤더가 잘못되면 에러이고, 잘못된 행은 건너뛰고 `rejected`에 집계합니다.
pub fn read_daily_csv<R: Read>(reader: R) -> Result<CsvBars> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = Columns::from_headers(rdr.headers()?)?;
    let mut out = CsvBars::default();

    for (index, row) in rdr.records().enumerate() {
        // 헤더 다음 행부터 1
        let line = index + 2;
        let parsed = row
            .map_err(|e| e.to_string())
            .and_then(|row| parse_row(&row, &columns));
        match parsed {
            Ok(bar) => out.bars.push(bar),
            Err(e) => {
                tracing::warn!(line, error = %e, "CSV 행 건너뜀");
                out.rejected += 1;
            }
        }
    }

    Ok(out)
}

fn parse_row(row: &csv::StringRecord, columns: &Columns) -> std::result::Result<Bar, String> {
    let stamp = row.get(0).ok_or("시각 열이 비어 있습니다")?;
    let timestamp = parse_timestamp(stamp).ok_or_else(|| format!("잘못된 시각: '{stamp}'"))?;

    let value = |column: Option<usize>| -> std::result::Result<Option<f64>, String> {
        let Some(raw) = column.and_then(|i| row.get(i)) else {
            return Ok(None);
        };
        if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
            return Ok(None);
        }
        raw.parse::<f64>()
            .map(|v| finite(Some(v)))
            .map_err(|_| format!("잘못된 숫자: '{raw}'"))
    };

    Ok(Bar {
        timestamp,
        open: value(columns.open)?,
        high: value(columns.high)?,
        low: value(columns.low)?,
        close: value(columns.close)?,
        volume: value(columns.volume)?,
    })
}

/// RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` 형식의 시각을 UTC로 해석합니다.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(value, format) {
            return Some(at.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|day| day.and_time(NaiveTime::MIN).and_utc())
}

/// CSV 파일의 일봉을 과거 경로 규칙으로 병합합니다.
///
/// 파일이 없으면 아무것도 하지 않습니다. 파싱하지 못한 행과 저장 실패는
/// `errors`에 집계됩니다.
pub async fn import_csv(store: &dyn RecordStore, path: &Path) -> Result<CollectionStats> {
    let start = Instant::now();
    let mut stats = CollectionStats::new();

    if !path.exists() {
        tracing::info!(path = %path.display(), "CSV 파일 없음, 가져오기 건너뜀");
        return Ok(stats);
    }

    let file = std::fs::File::open(path)
        .map_err(|e| CollectorError::Import(format!("{}: {e}", path.display())))?;
    let parsed = read_daily_csv(file)?;
    tracing::info!(
        path = %path.display(),
        rows = parsed.bars.len() + parsed.rejected,
        "CSV 로드"
    );

    stats.total = parsed.bars.len() + parsed.rejected;
    stats.errors = parsed.rejected;

    for bar in &parsed.bars {
        if bar.is_empty() {
            stats.empty += 1;
            continue;
        }
        match merge_historical(store, bar.day(), bar).await {
            Ok(_) => stats.applied += 1,
            Err(e) => {
                tracing::error!(day = %bar.day(), error = %e, "CSV 일봉 저장 실패");
                stats.errors += 1;
            }
        }
    }

    stats.elapsed = start.elapsed();
    stats.log_summary("CSV 가져오기");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use dominance_core::{day_start_ms, RecordKind};
    use dominance_data::MemoryRecordStore;

    const EXPORT: &str = "\
datetime,symbol,open,high,low,close,volume
2024-09-13 00:00:00,CRYPTOCAP:BTC.D,57.5,58.0,57.2,57.9,900
2024-09-14 00:00:00,CRYPTOCAP:BTC.D,57.9,58.6,57.8,58.3,1000
";

    #[test]
    fn test_reads_export_with_extra_columns() {
        let parsed = read_daily_csv(EXPORT.as_bytes()).unwrap();
        assert_eq!(parsed.rejected, 0);
        assert_eq!(parsed.bars.len(), 2);

        let bar = parsed.bars[1];
        assert_eq!(bar.timestamp, Utc.with_ymd_and_hms(2024, 9, 14, 0, 0, 0).unwrap());
        assert_eq!(bar.open, Some(57.9));
        assert_eq!(bar.close, Some(58.3));
        assert_eq!(bar.volume, Some(1000.0));
    }

    #[test]
    fn test_capitalized_headers_and_missing_values() {
        let body = "\
Date,Open,High,Low,Close
2024-09-14,57.9,58.6,,nan
";
        let parsed = read_daily_csv(body.as_bytes()).unwrap();
        let bar = parsed.bars[0];
        assert_eq!(bar.day(), NaiveDate::from_ymd_opt(2024, 9, 14).unwrap());
        assert_eq!(bar.high, Some(58.6));
        assert_eq!(bar.low, None);
        assert_eq!(bar.close, None);
        assert_eq!(bar.volume, None);
    }

    #[test]
    fn test_bad_rows_are_counted_not_fatal() {
        let body = "\
datetime,open,high,low,close
yesterday,1,2,0.5,1.5
2024-09-14 00:00:00,57.9,58.6,57.8,abc
2024-09-15 00:00:00,58.3,58.9,58.1,58.7
";
        let parsed = read_daily_csv(body.as_bytes()).unwrap();
        assert_eq!(parsed.rejected, 2);
        assert_eq!(parsed.bars.len(), 1);
        assert_eq!(parsed.bars[0].close, Some(58.7));
    }

    #[test]
    fn test_rejects_file_without_price_columns() {
        let body = "datetime,symbol\n2024-09-14,BTC.D\n";
        assert!(matches!(
            read_daily_csv(body.as_bytes()),
            Err(CollectorError::Import(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_skipped() {
        let store = MemoryRecordStore::new();
        let path = std::env::temp_dir().join("dominance-collector-no-such-file.csv");
        let stats = import_csv(&store, &path).await.unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_import_merges_as_historical() {
        let path = std::env::temp_dir().join(format!(
            "dominance-collector-import-{}.csv",
            std::process::id()
        ));
        std::fs::write(&path, EXPORT).unwrap();

        let store = MemoryRecordStore::new();
        let stats = import_csv(&store, &path).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(stats.applied, 2);
        assert_eq!(store.count().await.unwrap(), 2);
        let day = NaiveDate::from_ymd_opt(2024, 9, 13).unwrap();
        let record = store.find_one(day_start_ms(day)).await.unwrap().unwrap();
        assert_eq!(record.record_kind, RecordKind::Historical);
        assert_eq!(record.close, Some(57.9));
        assert_eq!(record.volume, Some(900.0));
    }
}
