//! 주기 실행 태스크.
//!
//! 각 루프는 `PeriodicTask` 하나로 표현됩니다. 시작하면 사이클을 즉시 한 번
//! 실행하고, 이후 `Schedule`이 계산한 대기 시간마다 반복합니다.
//!
//! 상태는 `Stopped → Running → Stopped` 두 가지뿐입니다. 정지는 협력적이며
//! 대기 중인 sleep만 깨우고 실행 중인 사이클은 끝까지 진행됩니다.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 현재 시각 공급자.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 시계.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 다음 실행 시점 계산 규칙.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// 고정 간격
    Every(Duration),
    /// 매일 지정한 UTC 시각
    DailyAt(NaiveTime),
}

impl Schedule {
    /// `now` 기준 다음 실행까지 대기 시간.
    ///
    /// 매 사이클마다 벽시계로 다시 계산하므로 누적 오차가 없습니다.
    /// 시간대 변환 없이 UTC 산술만 사용합니다.
    pub fn delay_until_next(&self, now: DateTime<Utc>) -> Duration {
        match *self {
            Schedule::Every(interval) => interval,
            Schedule::DailyAt(at) => {
                let today = now.date_naive().and_time(at).and_utc();
                let next = if today > now {
                    today
                } else {
                    today + ChronoDuration::days(1)
                };
                (next - now).to_std().unwrap_or_default()
            }
        }
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schedule::Every(interval) => write!(f, "every {}s", interval.as_secs()),
            Schedule::DailyAt(at) => write!(f, "daily at {} UTC", at.format("%H:%M:%S")),
        }
    }
}

/// 한 사이클 단위로 실행되는 작업.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// 로그에 표시할 이름
    fn name(&self) -> &str;

    /// 사이클 한 번 실행. 에러는 루프가 로그로 남기고 다음 사이클로 진행합니다.
    async fn run_cycle(&self) -> anyhow::Result<()>;
}

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// `start()/stop()`을 노출하는 주기 실행 태스크.
pub struct PeriodicTask {
    job: Arc<dyn Job>,
    schedule: Schedule,
    clock: Arc<dyn Clock>,
    stop_timeout: Duration,
    running: Mutex<Option<Running>>,
}

impl PeriodicTask {
    /// 새 태스크를 생성합니다. 정지 대기 시간 기본값은 2초입니다.
    pub fn new(job: Arc<dyn Job>, schedule: Schedule, clock: Arc<dyn Clock>) -> Self {
        Self {
            job,
            schedule,
            clock,
            stop_timeout: Duration::from_secs(2),
            running: Mutex::new(None),
        }
    }

    /// 정지 시 사이클 종료를 기다릴 최대 시간을 설정합니다.
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    /// 작업 이름.
    pub fn name(&self) -> &str {
        self.job.name()
    }

    /// 실행 중인지 확인합니다.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|guard| guard.as_ref().is_some_and(|r| !r.handle.is_finished()))
            .unwrap_or(false)
    }

    /// 루프를 시작합니다. 이미 실행 중이면 `false`를 반환합니다.
    pub fn start(&self) -> bool {
        let Ok(mut guard) = self.running.lock() else {
            error!(job = self.job.name(), "task state lock poisoned");
            return false;
        };
        if guard.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            debug!(job = self.job.name(), "task already running");
            return false;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.job),
            self.schedule,
            Arc::clone(&self.clock),
            token.clone(),
        ));
        *guard = Some(Running { token, handle });

        info!(job = self.job.name(), schedule = %self.schedule, "task started");
        true
    }

    /// 루프를 정지합니다.
    ///
    /// 진행 중인 사이클이 정지 대기 시간 안에 끝나면 `true`를 반환합니다.
    /// 시간을 넘기면 사이클은 백그라운드에서 마저 끝난 뒤 종료됩니다.
    pub async fn stop(&self) -> bool {
        let running = match self.running.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let Some(Running { token, handle }) = running else {
            return true;
        };

        token.cancel();
        match tokio::time::timeout(self.stop_timeout, handle).await {
            Ok(Ok(())) => {
                info!(job = self.job.name(), "task stopped");
                true
            }
            Ok(Err(e)) => {
                error!(job = self.job.name(), error = %e, "task ended abnormally");
                true
            }
            Err(_) => {
                warn!(
                    job = self.job.name(),
                    timeout_secs = self.stop_timeout.as_secs_f64(),
                    "cycle still in flight after stop timeout, detaching"
                );
                false
            }
        }
    }
}

async fn run_loop(
    job: Arc<dyn Job>,
    schedule: Schedule,
    clock: Arc<dyn Clock>,
    token: CancellationToken,
) {
    loop {
        if let Err(e) = job.run_cycle().await {
            error!(job = job.name(), error = %e, "cycle failed");
        }

        if token.is_cancelled() {
            break;
        }

        let delay = schedule.delay_until_next(clock.now());
        debug!(job = job.name(), delay_secs = delay.as_secs(), "sleeping until next cycle");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = token.cancelled() => break,
        }
    }

    debug!(job = job.name(), "task loop exited");
}
