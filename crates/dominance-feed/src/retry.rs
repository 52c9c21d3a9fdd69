//! 제한 횟수 재시도.
//!
//! 일시적 실패와 빈 결과는 고정 대기 후 재시도합니다. 재시도 예산을 모두
//! 쓰면 에러 대신 `FetchOutcome::NoData`를 반환하므로 호출자는 에러를
//! 따로 처리할 필요가 없습니다.

use crate::source::{BarRequest, BarSource};
use dominance_core::Bar;
use std::time::Duration;
use tracing::{debug, warn};

/// 재시도 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (최소 1)
    pub attempts: u32,
    /// 시도 사이의 고정 대기 시간
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// 새 정책을 생성합니다.
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }
}

/// 재시도 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// 시간순으로 정렬되고 타임스탬프 중복이 제거된 바
    Bars(Vec<Bar>),
    /// 재시도 후에도 데이터 없음
    NoData {
        attempts: u32,
        last_error: Option<String>,
    },
}

/// 재시도하며 바를 조회합니다.
///
/// 재시도 대상이 아닌 에러(예: 존재하지 않는 심볼)는 즉시 중단합니다.
pub async fn fetch_bars(
    source: &dyn BarSource,
    request: &BarRequest,
    policy: &RetryPolicy,
) -> FetchOutcome {
    let attempts = policy.attempts.max(1);
    let mut last_error = None;
    let mut made = 0;

    for attempt in 1..=attempts {
        made = attempt;
        match source.fetch(request).await {
            Ok(bars) if !bars.is_empty() => {
                debug!(
                    source = source.name(),
                    symbol = %request.qualified_symbol(),
                    attempt,
                    bars = bars.len(),
                    "bars fetched"
                );
                return FetchOutcome::Bars(normalize(bars));
            }
            Ok(_) => {
                debug!(
                    source = source.name(),
                    symbol = %request.qualified_symbol(),
                    attempt,
                    "empty result"
                );
                last_error = None;
            }
            Err(e) => {
                warn!(
                    source = source.name(),
                    symbol = %request.qualified_symbol(),
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "fetch attempt failed"
                );
                let transient = e.is_transient();
                last_error = Some(e.to_string());
                if !transient {
                    break;
                }
            }
        }

        if attempt < attempts {
            tokio::time::sleep(policy.backoff).await;
        }
    }

    warn!(
        symbol = %request.qualified_symbol(),
        attempts = made,
        "no bars returned after retries"
    );
    FetchOutcome::NoData {
        attempts: made,
        last_error,
    }
}

/// 시간순 정렬 후 같은 타임스탬프는 나중 값만 남깁니다.
fn normalize(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.sort_by_key(|bar| bar.timestamp);
    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.timestamp == bar.timestamp => *last = bar,
            _ => out.push(bar),
        }
    }
    out
}
