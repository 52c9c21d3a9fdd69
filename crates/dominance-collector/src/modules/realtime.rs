//! 실시간 경로: 당일 샘플 병합.

use crate::modules::scheduler::{Clock, Job};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dominance_core::{realtime_patch, utc_day, Bar, DailyRecord, Interval};
use dominance_data::RecordStore;
use dominance_feed::{fetch_bars, BarRequest, BarSource, FetchOutcome, RetryPolicy};
use dominance_notification::DataMonitor;
use std::sync::Arc;
use std::time::Duration;

/// 샘플 조회 시 요청하는 바 수. 마지막 바가 진행 중인 구간입니다.
const SAMPLE_BARS: usize = 2;

/// 기록 후 알림 훅의 최대 실행 시간.
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// 당일 샘플을 `day` 레코드에 병합합니다.
///
/// 레코드가 없으면 샘플로 생성(`realtime_seeded`)하고, 있으면 `current_*`와
/// `last_update`를 설정하며 `high`는 올리기만, `low`는 내리기만 합니다.
/// `open`과 `volume`은 수정하지 않습니다.
pub async fn merge_realtime(
    store: &dyn RecordStore,
    day: NaiveDate,
    sample: &Bar,
    now: DateTime<Utc>,
) -> Result<DailyRecord> {
    let record = store.upsert(&realtime_patch(day, sample, now)).await?;
    tracing::debug!(
        day = %day,
        current_close = ?record.current_close,
        high = ?record.high,
        low = ?record.low,
        "realtime sample merged"
    );
    Ok(record)
}

/// 실시간 경로 작업.
pub struct RealtimeJob {
    source: Arc<dyn BarSource>,
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    monitor: Option<Arc<DataMonitor>>,
    symbol: String,
    exchange: String,
    interval: Interval,
    policy: RetryPolicy,
}

impl RealtimeJob {
    /// 새 작업을 생성합니다. 샘플 간격 기본값은 일봉입니다.
    pub fn new(
        source: Arc<dyn BarSource>,
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        symbol: impl Into<String>,
        exchange: impl Into<String>,
    ) -> Self {
        Self {
            source,
            store,
            clock,
            monitor: None,
            symbol: symbol.into(),
            exchange: exchange.into(),
            interval: Interval::D1,
            policy: RetryPolicy::default(),
        }
    }

    /// 기록 후 호출할 신선도 모니터를 설정합니다.
    pub fn with_monitor(mut self, monitor: Arc<DataMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// 샘플 조회 간격을 설정합니다.
    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    /// 재시도 정책을 설정합니다.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 최신 샘플을 조회해 오늘(벽시계 UTC) 레코드에 병합합니다.
    ///
    /// 데이터가 없으면 `Ok(None)`입니다. 알림 훅은 별도 태스크에서 실행되므로
    /// 알림 지연이나 실패가 기록 결과와 다음 사이클에 영향을 주지 않습니다.
    pub async fn collect_once(&self) -> Result<Option<DailyRecord>> {
        let request = BarRequest::new(&self.symbol, &self.exchange, self.interval, SAMPLE_BARS);
        let sample = match fetch_bars(self.source.as_ref(), &request, &self.policy).await {
            FetchOutcome::Bars(bars) => bars.last().copied(),
            FetchOutcome::NoData { attempts, .. } => {
                tracing::warn!(
                    symbol = %request.qualified_symbol(),
                    attempts,
                    "실시간 샘플 없음, 사이클 건너뜀"
                );
                None
            }
        };
        let Some(sample) = sample else {
            return Ok(None);
        };

        // 샘플 자체의 타임스탬프가 아닌 벽시계 기준 일자
        let now = self.clock.now();
        let day = utc_day(now);
        let record = merge_realtime(self.store.as_ref(), day, &sample, now).await?;

        tracing::info!(
            day = %day,
            close = ?sample.close,
            high = ?record.high,
            low = ?record.low,
            kind = %record.record_kind,
            "실시간 샘플 저장"
        );

        if let Some(monitor) = &self.monitor {
            spawn_notify(monitor.clone(), record.clone());
        }

        Ok(Some(record))
    }
}

fn spawn_notify(monitor: Arc<DataMonitor>, record: DailyRecord) {
    tokio::spawn(async move {
        let notify = monitor.check_and_notify(&record);
        if tokio::time::timeout(NOTIFY_TIMEOUT, notify).await.is_err() {
            tracing::warn!(
                day = %record.day,
                timeout_secs = NOTIFY_TIMEOUT.as_secs(),
                "알림 훅 시간 초과"
            );
        }
    });
}

#[async_trait]
impl Job for RealtimeJob {
    fn name(&self) -> &str {
        "realtime"
    }

    async fn run_cycle(&self) -> anyhow::Result<()> {
        self.collect_once().await?;
        Ok(())
    }
}

/// 신선도 점검 작업.
pub struct MonitorJob {
    monitor: Arc<DataMonitor>,
    clock: Arc<dyn Clock>,
}

impl MonitorJob {
    pub fn new(monitor: Arc<DataMonitor>, clock: Arc<dyn Clock>) -> Self {
        Self { monitor, clock }
    }
}

#[async_trait]
impl Job for MonitorJob {
    fn name(&self) -> &str {
        "monitor"
    }

    async fn run_cycle(&self) -> anyhow::Result<()> {
        if self.monitor.check_staleness(self.clock.now()).await {
            tracing::warn!("실시간 데이터 중단 경고 전송");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use dominance_core::{day_start_ms, RecordKind};
    use dominance_data::MemoryRecordStore;
    use dominance_feed::FeedResult;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct LatestSource(Vec<Bar>);

    #[async_trait]
    impl BarSource for LatestSource {
        async fn fetch(&self, _request: &BarRequest) -> FeedResult<Vec<Bar>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "latest"
        }
    }

    #[tokio::test]
    async fn test_uses_wall_clock_day_and_last_bar() {
        let now = Utc.with_ymd_and_hms(2024, 9, 15, 0, 0, 20).unwrap();
        // 제공자가 아직 전날 바를 마지막으로 돌려주는 경우
        let yesterday = Utc.with_ymd_and_hms(2024, 9, 14, 0, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2024, 9, 13, 0, 0, 0).unwrap();
        let source = LatestSource(vec![
            Bar::new(older, 1.0, 1.0, 1.0, 1.0, None),
            Bar::new(yesterday, 58.0, 58.5, 58.0, 58.2, Some(10.0)),
        ]);

        let store = Arc::new(MemoryRecordStore::new());
        let job = RealtimeJob::new(
            Arc::new(source),
            store.clone(),
            Arc::new(FixedClock(now)),
            "BTC.D",
            "CRYPTOCAP",
        );

        let record = job.collect_once().await.unwrap().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 9, 15).unwrap();
        assert_eq!(record.day, today);
        assert_eq!(record.timestamp_ms, day_start_ms(today));
        assert_eq!(record.record_kind, RecordKind::RealtimeSeeded);
        assert_eq!(record.current_close, Some(58.2));
        assert_eq!(record.current_volume, Some(10.0));
        assert_eq!(record.volume, None);
        assert_eq!(record.last_update, Some(now));
    }

    #[tokio::test]
    async fn test_empty_source_writes_nothing() {
        let store = Arc::new(MemoryRecordStore::new());
        let job = RealtimeJob::new(
            Arc::new(LatestSource(Vec::new())),
            store.clone(),
            Arc::new(FixedClock(Utc::now())),
            "BTC.D",
            "CRYPTOCAP",
        )
        .with_policy(RetryPolicy::new(1, std::time::Duration::ZERO));

        assert!(job.collect_once().await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
