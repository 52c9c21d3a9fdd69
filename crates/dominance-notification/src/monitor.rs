//! 실시간 데이터 신선도 모니터.
//!
//! 실시간 경로가 기록할 때마다 `check_and_notify`가 호출되고, 별도 주기로
//! `check_staleness`가 호출됩니다. 갱신이 `data_timeout` 이상 끊기면 경고를
//! 한 번 보내고, 다시 기록되면 복구 알림을 보냅니다.
//!
//! 알림 실패는 로그만 남기며 호출자에게 전파하지 않습니다.

use crate::telegram::NotificationManager;
use crate::types::{Notification, NotificationEvent, NotificationPriority};
use chrono::{DateTime, Utc};
use dominance_core::DailyRecord;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 모니터 설정.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// 모니터 활성화 여부
    pub enabled: bool,
    /// 신선도 점검 주기
    pub check_interval: Duration,
    /// 이 시간 이상 갱신이 없으면 중단으로 판단
    pub data_timeout: Duration,
    /// 알림에 표시할 심볼
    pub symbol: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval: Duration::from_secs(30),
            data_timeout: Duration::from_secs(60),
            symbol: "CRYPTOCAP:BTC.D".to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    last_update: Option<DateTime<Utc>>,
    alerted_at: Option<DateTime<Utc>>,
}

/// 데이터 신선도 모니터.
pub struct DataMonitor {
    config: MonitorConfig,
    notifier: NotificationManager,
    state: Mutex<MonitorState>,
}

impl DataMonitor {
    /// 새 모니터를 생성합니다.
    pub fn new(config: MonitorConfig, notifier: NotificationManager) -> Self {
        Self {
            config,
            notifier,
            state: Mutex::new(MonitorState::default()),
        }
    }

    /// 모니터 설정.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// 현재 중단 경고 상태인지 확인합니다.
    pub async fn is_alerting(&self) -> bool {
        self.state.lock().await.alerted_at.is_some()
    }

    /// 실시간 기록 직후 호출됩니다.
    ///
    /// 중단 경고 중이었다면 복구 알림을 보내고 경고를 해제합니다.
    pub async fn check_and_notify(&self, record: &DailyRecord) {
        if !self.config.enabled {
            return;
        }

        let updated_at = record.last_update.unwrap_or_else(Utc::now);
        let previous = {
            let mut state = self.state.lock().await;
            let previous = state.last_update.replace(updated_at);
            state.alerted_at.take().map(|_| previous)
        };

        let Some(previous) = previous else {
            debug!(day = %record.day, "monitor heartbeat recorded");
            return;
        };

        let down_secs = previous
            .map(|p| (updated_at - p).num_seconds())
            .unwrap_or_default();
        info!(day = %record.day, down_secs, "realtime data resumed");

        let notification = Notification::new(NotificationEvent::DataResumed {
            symbol: self.config.symbol.clone(),
            day: record.day.to_string(),
            close: record.current_close,
            down_secs,
        });
        if let Err(e) = self.notifier.notify(&notification).await {
            warn!(error = %e, "resume notification failed");
        }
    }

    /// 마지막 실시간 기록 이후 `data_timeout`이 지났으면 경고를 보냅니다.
    ///
    /// 경고를 새로 보냈으면 `true`를 반환합니다. 한 번 경고한 뒤에는
    /// 데이터가 재개될 때까지 다시 보내지 않습니다.
    pub async fn check_staleness(&self, now: DateTime<Utc>) -> bool {
        if !self.config.enabled {
            return false;
        }

        let last_update = {
            let state = self.state.lock().await;
            if state.alerted_at.is_some() {
                return false;
            }
            match state.last_update {
                Some(last) => last,
                None => return false,
            }
        };

        let elapsed = (now - last_update).to_std().unwrap_or_default();
        if elapsed <= self.config.data_timeout {
            return false;
        }

        warn!(
            last_update = %last_update,
            stale_secs = elapsed.as_secs(),
            "realtime data is stale"
        );

        let notification = Notification::new(NotificationEvent::DataStale {
            symbol: self.config.symbol.clone(),
            last_update: Some(last_update),
            stale_secs: elapsed.as_secs() as i64,
        })
        .with_priority(NotificationPriority::High);

        match self.notifier.notify(&notification).await {
            Ok(()) => {
                self.state.lock().await.alerted_at = Some(now);
                true
            }
            Err(e) => {
                warn!(error = %e, "stale notification failed, will retry on next check");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NotificationResult, NotificationSender};
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use dominance_core::RecordKind;
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Clone, Default)]
    struct Recorder {
        sent: Arc<StdMutex<Vec<NotificationEvent>>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSender for Recorder {
        async fn send(&self, notification: &Notification) -> NotificationResult<()> {
            if self.fail {
                return Err(crate::NotificationError::SendFailed("down".into()));
            }
            self.sent.lock().unwrap().push(notification.event.clone());
            Ok(())
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 14, 10, 0, 0).unwrap() + chrono::Duration::seconds(secs as i64)
    }

    fn record(updated: DateTime<Utc>) -> DailyRecord {
        let mut r = DailyRecord::empty(NaiveDate::from_ymd_opt(2024, 9, 14).unwrap(), RecordKind::Historical);
        r.last_update = Some(updated);
        r.current_close = Some(58.2);
        r
    }

    fn monitor(recorder: &Recorder) -> DataMonitor {
        let mut manager = NotificationManager::new();
        manager.add_sender(recorder.clone());
        DataMonitor::new(MonitorConfig::default(), manager)
    }

    #[tokio::test]
    async fn test_no_alert_before_first_update() {
        let recorder = Recorder::default();
        let monitor = monitor(&recorder);
        assert!(!monitor.check_staleness(at(600)).await);
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_alert_then_resume() {
        let recorder = Recorder::default();
        let monitor = monitor(&recorder);

        monitor.check_and_notify(&record(at(0))).await;
        assert!(!monitor.check_staleness(at(30)).await);
        assert!(monitor.check_staleness(at(90)).await);
        // 재개 전까지는 반복 경고 없음
        assert!(!monitor.check_staleness(at(120)).await);
        assert!(monitor.is_alerting().await);

        monitor.check_and_notify(&record(at(150))).await;
        assert!(!monitor.is_alerting().await);

        let sent = recorder.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], NotificationEvent::DataStale { stale_secs: 90, .. }));
        assert!(matches!(
            sent[1],
            NotificationEvent::DataResumed { down_secs: 150, .. }
        ));
    }

    #[tokio::test]
    async fn test_failed_send_is_swallowed_and_retried() {
        let recorder = Recorder {
            fail: true,
            ..Default::default()
        };
        let monitor = monitor(&recorder);

        monitor.check_and_notify(&record(at(0))).await;
        assert!(!monitor.check_staleness(at(90)).await);
        assert!(!monitor.is_alerting().await);
    }

    #[tokio::test]
    async fn test_disabled_monitor_does_nothing() {
        let recorder = Recorder::default();
        let mut manager = NotificationManager::new();
        manager.add_sender(recorder.clone());
        let config = MonitorConfig {
            enabled: false,
            ..Default::default()
        };
        let monitor = DataMonitor::new(config, manager);

        monitor.check_and_notify(&record(at(0))).await;
        assert!(!monitor.check_staleness(at(1000)).await);
        assert!(recorder.sent.lock().unwrap().is_empty());
    }
}
