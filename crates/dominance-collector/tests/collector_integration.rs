//! 인메모리 저장소를 사용한 과거/실시간 경로 통합 테스트.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use dominance_collector::modules::{
    backfill, import_csv, merge_historical, merge_realtime, Clock, HistoricalJob, PeriodicTask,
    RealtimeJob, Schedule,
};
use dominance_core::{day_start_ms, Bar, RecordKind};
use dominance_data::{MemoryRecordStore, RecordStore};
use dominance_feed::{BarRequest, BarSource, FeedError, FeedResult, RetryPolicy};
use dominance_notification::{
    DataMonitor, MonitorConfig, Notification, NotificationError, NotificationEvent,
    NotificationManager, NotificationResult, NotificationSender,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(now)))
    }

    fn advance(&self, secs: i64) {
        *self.0.lock().unwrap() += ChronoDuration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// 준비된 응답을 순서대로 돌려준 뒤에는 기본 바를 계속 반환합니다.
struct ScriptedSource {
    script: Mutex<VecDeque<FeedResult<Vec<Bar>>>>,
    fallback: Vec<Bar>,
    calls: AtomicU32,
}

impl ScriptedSource {
    fn new(script: Vec<FeedResult<Vec<Bar>>>, fallback: Vec<Bar>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicU32::new(0),
        })
    }

    fn always(bars: Vec<Bar>) -> Arc<Self> {
        Self::new(Vec::new(), bars)
    }
}

#[async_trait]
impl BarSource for ScriptedSource {
    async fn fetch(&self, _request: &BarRequest) -> FeedResult<Vec<Bar>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(self.fallback.clone()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// 중단 경고만 전달하고 나머지 알림은 실패시킵니다.
#[derive(Clone, Default)]
struct FlakySender {
    delivered: Arc<Mutex<Vec<NotificationEvent>>>,
}

#[async_trait]
impl NotificationSender for FlakySender {
    async fn send(&self, notification: &Notification) -> NotificationResult<()> {
        match notification.event {
            NotificationEvent::DataStale { .. } => {
                self.delivered.lock().unwrap().push(notification.event.clone());
                Ok(())
            }
            _ => Err(NotificationError::SendFailed("chat unavailable".into())),
        }
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// 중단 경고는 전달하고, 복구 알림은 응답 없이 멈춥니다.
#[derive(Clone, Default)]
struct HangingSender {
    resumed_calls: Arc<AtomicU32>,
}

#[async_trait]
impl NotificationSender for HangingSender {
    async fn send(&self, notification: &Notification) -> NotificationResult<()> {
        match notification.event {
            NotificationEvent::DataStale { .. } => Ok(()),
            NotificationEvent::DataResumed { .. } => {
                self.resumed_calls.fetch_add(1, Ordering::SeqCst);
                std::future::pending().await
            }
        }
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "hanging"
    }
}

fn day_d() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 14).unwrap()
}

fn midday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 14, 12, 0, 0).unwrap()
}

fn settled_bar() -> Bar {
    let ts = day_d().and_hms_opt(0, 0, 0).unwrap().and_utc();
    Bar::new(ts, 57.9, 58.6, 57.8, 58.3, Some(1000.0))
}

fn live_sample(high: f64, low: f64, close: f64) -> Bar {
    let ts = day_d().and_hms_opt(0, 0, 0).unwrap().and_utc();
    Bar::new(ts, 58.0, high, low, close, Some(12.5))
}

/// 별도 태스크로 실행되는 알림 훅이 진행할 기회를 줍니다.
async fn settle_hooks() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(100))
}

#[tokio::test]
async fn realtime_seed_then_historical_settles_day() {
    let store = Arc::new(MemoryRecordStore::new());
    let clock = ManualClock::at(midday());

    let realtime = RealtimeJob::new(
        ScriptedSource::always(vec![live_sample(58.5, 58.0, 58.2)]),
        store.clone(),
        clock.clone(),
        "BTC.D",
        "CRYPTOCAP",
    );
    let seeded = realtime.collect_once().await.unwrap().unwrap();
    assert_eq!(seeded.record_kind, RecordKind::RealtimeSeeded);
    assert_eq!(seeded.current_close, Some(58.2));
    assert_eq!(seeded.volume, None);

    let historical = HistoricalJob::new(
        ScriptedSource::always(vec![settled_bar()]),
        store.clone(),
        "BTC.D",
        "CRYPTOCAP",
    );
    let stats = historical.collect(5).await.unwrap();
    assert_eq!(stats.applied, 1);

    let record = store
        .find_one(day_start_ms(day_d()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.open, Some(57.9));
    assert_eq!(record.high, Some(58.6));
    assert_eq!(record.low, Some(57.8));
    assert_eq!(record.close, Some(58.3));
    assert_eq!(record.volume, Some(1000.0));
    assert_eq!(record.current_close, Some(58.2));
    assert_eq!(record.last_update, Some(midday()));
    assert_eq!(record.record_kind, RecordKind::RealtimeSeeded);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn historical_realtime_historical_restores_settled_fields() {
    let store = MemoryRecordStore::new();
    let bar = settled_bar();

    merge_historical(&store, day_d(), &bar).await.unwrap();
    let after_realtime = merge_realtime(&store, day_d(), &live_sample(59.4, 57.1, 59.0), midday())
        .await
        .unwrap();
    assert_eq!(after_realtime.high, Some(59.4));
    assert_eq!(after_realtime.low, Some(57.1));
    assert_eq!(after_realtime.close, Some(59.0));
    assert_eq!(after_realtime.open, Some(57.9));
    assert_eq!(after_realtime.volume, Some(1000.0));

    let restored = merge_historical(&store, day_d(), &bar).await.unwrap();
    assert_eq!(restored.high, Some(58.6));
    assert_eq!(restored.low, Some(57.8));
    assert_eq!(restored.close, Some(58.3));
    assert_eq!(restored.current_high, Some(59.4));
    assert_eq!(restored.current_close, Some(59.0));
    assert_eq!(restored.last_update, Some(midday()));
}

#[tokio::test]
async fn merge_order_keeps_field_ownership() {
    let bar = settled_bar();
    let sample = live_sample(58.9, 57.5, 58.1);

    let a = MemoryRecordStore::new();
    merge_historical(&a, day_d(), &bar).await.unwrap();
    let a = merge_realtime(&a, day_d(), &sample, midday()).await.unwrap();

    let b = MemoryRecordStore::new();
    merge_realtime(&b, day_d(), &sample, midday()).await.unwrap();
    let b = merge_historical(&b, day_d(), &bar).await.unwrap();

    assert_eq!(a.volume, b.volume);
    assert_eq!(a.open, b.open);
    assert_eq!(a.current_close, b.current_close);
    assert_eq!(a.current_volume, b.current_volume);
    assert_eq!(a.last_update, b.last_update);
    // close는 마지막 기록이 이김
    assert_eq!(a.close, Some(58.1));
    assert_eq!(b.close, Some(58.3));
}

#[tokio::test]
async fn csv_import_then_backfill_with_fallback_symbol() {
    let path = std::env::temp_dir().join(format!("dominance-backfill-{}.csv", std::process::id()));
    std::fs::write(
        &path,
        "datetime,symbol,open,high,low,close,volume\n\
         2024-09-12 00:00:00,CRYPTOCAP:BTC.D,57.0,57.6,56.9,57.4,800\n\
         2024-09-13 00:00:00,CRYPTOCAP:BTC.D,57.4,58.0,57.2,57.5,850\n",
    )
    .unwrap();

    let store = Arc::new(MemoryRecordStore::new());
    let imported = import_csv(store.as_ref(), &path).await;
    std::fs::remove_file(&path).ok();
    assert_eq!(imported.unwrap().applied, 2);

    // 기본 심볼은 빈 결과, 대체 심볼이 13일(수정값)과 14일을 돌려줌
    let ts = |d: u32| {
        NaiveDate::from_ymd_opt(2024, 9, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
    };
    let source = ScriptedSource::new(
        vec![Ok(Vec::new())],
        vec![
            Bar::new(ts(13), 57.4, 58.0, 57.2, 57.9, Some(900.0)),
            settled_bar(),
        ],
    );
    let job = HistoricalJob::new(source.clone(), store.clone(), "BTC.D", "CRYPTOCAP")
        .with_policy(RetryPolicy::new(1, Duration::ZERO))
        .with_fallback_symbol(Some("BTCD".to_string()));

    let stats = backfill(&job, 10).await.unwrap();
    assert_eq!(stats.applied, 2);
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.count().await.unwrap(), 3);

    let day = |d: u32| day_start_ms(NaiveDate::from_ymd_opt(2024, 9, d).unwrap());
    let kept = store.find_one(day(12)).await.unwrap().unwrap();
    assert_eq!(kept.close, Some(57.4));
    let revised = store.find_one(day(13)).await.unwrap().unwrap();
    assert_eq!(revised.close, Some(57.9));
    assert_eq!(revised.volume, Some(900.0));
    let latest = store.latest().await.unwrap().unwrap();
    assert_eq!(latest.day, day_d());
}

#[tokio::test]
async fn notifier_failure_does_not_abort_write() {
    let store = Arc::new(MemoryRecordStore::new());
    let clock = ManualClock::at(midday());
    let sender = FlakySender::default();

    let mut manager = NotificationManager::new();
    manager.add_sender(sender.clone());
    let monitor = Arc::new(DataMonitor::new(MonitorConfig::default(), manager));

    let job = RealtimeJob::new(
        ScriptedSource::always(vec![live_sample(58.5, 58.0, 58.2)]),
        store.clone(),
        clock.clone(),
        "BTC.D",
        "CRYPTOCAP",
    )
    .with_monitor(monitor.clone());

    job.collect_once().await.unwrap();
    settle_hooks().await;
    clock.advance(120);
    assert!(monitor.check_staleness(clock.now()).await);

    // 복구 알림 전송은 실패하지만 기록은 성공해야 함
    clock.advance(5);
    let record = job.collect_once().await.unwrap().unwrap();
    assert_eq!(record.last_update, Some(clock.now()));
    settle_hooks().await;
    assert!(!monitor.is_alerting().await);
    assert_eq!(sender.delivered.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn hung_resume_notification_does_not_block_realtime_cycle() {
    let store = Arc::new(MemoryRecordStore::new());
    let clock = ManualClock::at(midday());
    let sender = HangingSender::default();

    let mut manager = NotificationManager::new();
    manager.add_sender(sender.clone());
    let monitor = Arc::new(DataMonitor::new(MonitorConfig::default(), manager));

    let job = RealtimeJob::new(
        ScriptedSource::always(vec![live_sample(58.5, 58.0, 58.2)]),
        store.clone(),
        clock.clone(),
        "BTC.D",
        "CRYPTOCAP",
    )
    .with_monitor(monitor.clone());

    job.collect_once().await.unwrap();
    settle_hooks().await;
    clock.advance(120);
    assert!(monitor.check_staleness(clock.now()).await);

    clock.advance(5);
    let resumed = tokio::time::timeout(Duration::from_secs(1), job.collect_once())
        .await
        .expect("collect_once blocked on the notification hook")
        .unwrap()
        .unwrap();
    assert_eq!(resumed.last_update, Some(clock.now()));

    settle_hooks().await;
    assert_eq!(sender.resumed_calls.load(Ordering::SeqCst), 1);
    assert!(!monitor.is_alerting().await);

    // 멈춘 알림과 무관하게 다음 사이클도 바로 기록됨
    clock.advance(30);
    let next = tokio::time::timeout(Duration::from_secs(1), job.collect_once())
        .await
        .expect("second cycle blocked")
        .unwrap()
        .unwrap();
    assert_eq!(next.last_update, Some(clock.now()));
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn realtime_task_survives_failing_cycles() {
    let store = Arc::new(MemoryRecordStore::new());
    let clock = ManualClock::at(midday());
    let down = || Err(FeedError::NetworkError("connection refused".into()));
    // 첫 사이클: 3회 모두 실패 → 데이터 없음
    let source = ScriptedSource::new(
        vec![down(), down(), down()],
        vec![live_sample(58.5, 58.0, 58.2)],
    );

    let job = RealtimeJob::new(source.clone(), store.clone(), clock, "BTC.D", "CRYPTOCAP")
        .with_policy(fast_retry());
    let task = PeriodicTask::new(
        Arc::new(job),
        Schedule::Every(Duration::from_secs(30)),
        Arc::new(dominance_collector::modules::SystemClock),
    );

    assert!(task.start());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(store.count().await.unwrap(), 0);
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(task.is_running());
    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(source.calls.load(Ordering::SeqCst), 4);

    assert!(task.stop().await);
    assert!(!task.is_running());
}

#[tokio::test(start_paused = true)]
async fn stop_waits_for_in_flight_fetch_within_timeout() {
    let store = Arc::new(MemoryRecordStore::new());
    let down = || Err(FeedError::Timeout(Duration::from_secs(1)));
    let source = ScriptedSource::new(vec![down(), down()], vec![settled_bar()]);

    let job = HistoricalJob::new(source.clone(), store.clone(), "BTC.D", "CRYPTOCAP")
        .with_policy(RetryPolicy::new(3, Duration::from_millis(500)));
    let task = PeriodicTask::new(
        Arc::new(job),
        Schedule::DailyAt(chrono::NaiveTime::from_hms_opt(0, 1, 0).unwrap()),
        ManualClock::at(midday()),
    )
    .with_stop_timeout(Duration::from_secs(2));

    task.start();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // 재시도 대기(2 × 500ms)가 남아 있지만 정지 대기 시간 안에 끝남
    assert!(task.stop().await);
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    assert_eq!(store.count().await.unwrap(), 1);
}
