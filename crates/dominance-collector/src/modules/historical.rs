//! 과거 경로: 확정 일봉 병합.

use crate::modules::scheduler::Job;
use crate::{CollectionStats, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use dominance_core::{historical_patch, Bar, DailyRecord, Interval};
use dominance_data::RecordStore;
use dominance_feed::{fetch_bars, BarRequest, BarSource, FetchOutcome, RetryPolicy};
use std::sync::Arc;
use std::time::Instant;

/// 확정 일봉을 `day` 레코드에 병합합니다.
///
/// 레코드가 없으면 바의 값으로 생성되고, 있으면 `open/high/low/close/volume/day`를
/// 덮어씁니다. 실시간 경로가 기록한 `current_*`와 `last_update`는 유지됩니다.
pub async fn merge_historical(
    store: &dyn RecordStore,
    day: NaiveDate,
    bar: &Bar,
) -> Result<DailyRecord> {
    let record = store.upsert(&historical_patch(day, bar)).await?;
    tracing::debug!(
        day = %day,
        close = ?record.close,
        volume = ?record.volume,
        "historical bar merged"
    );
    Ok(record)
}

/// 과거 경로 작업.
pub struct HistoricalJob {
    source: Arc<dyn BarSource>,
    store: Arc<dyn RecordStore>,
    symbol: String,
    fallback_symbol: Option<String>,
    exchange: String,
    bars: usize,
    policy: RetryPolicy,
}

impl HistoricalJob {
    /// 새 작업을 생성합니다. 사이클당 일봉 5개를 조회합니다.
    pub fn new(
        source: Arc<dyn BarSource>,
        store: Arc<dyn RecordStore>,
        symbol: impl Into<String>,
        exchange: impl Into<String>,
    ) -> Self {
        Self {
            source,
            store,
            symbol: symbol.into(),
            fallback_symbol: None,
            exchange: exchange.into(),
            bars: 5,
            policy: RetryPolicy::default(),
        }
    }

    /// 사이클당 조회할 일봉 수를 설정합니다.
    pub fn with_bars(mut self, bars: usize) -> Self {
        self.bars = bars;
        self
    }

    /// 재시도 정책을 설정합니다.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 기본 심볼에 데이터가 없을 때 조회할 대체 심볼을 설정합니다.
    pub fn with_fallback_symbol(mut self, symbol: Option<String>) -> Self {
        self.fallback_symbol = symbol.filter(|s| !s.is_empty());
        self
    }

    /// 기본 심볼, 그다음 대체 심볼 순서로 일봉을 조회합니다.
    async fn fetch_daily(&self, count: usize) -> Option<Vec<Bar>> {
        let fallback = self
            .fallback_symbol
            .as_deref()
            .filter(|s| *s != self.symbol);
        let symbols = std::iter::once(self.symbol.as_str()).chain(fallback);

        for symbol in symbols {
            let request = BarRequest::new(symbol, &self.exchange, Interval::D1, count);
            match fetch_bars(self.source.as_ref(), &request, &self.policy).await {
                FetchOutcome::Bars(bars) => {
                    if symbol != self.symbol {
                        tracing::info!(
                            symbol = %request.qualified_symbol(),
                            bars = bars.len(),
                            "대체 심볼로 일봉 조회"
                        );
                    }
                    return Some(bars);
                }
                FetchOutcome::NoData {
                    attempts,
                    last_error,
                } => {
                    tracing::warn!(
                        symbol = %request.qualified_symbol(),
                        attempts,
                        last_error = last_error.as_deref().unwrap_or("-"),
                        "과거 일봉 없음"
                    );
                }
            }
        }
        None
    }

    /// 최근 `count`개의 일봉을 조회해 병합합니다.
    ///
    /// 기본 심볼에 데이터가 없으면 대체 심볼을 한 번 더 조회합니다.
    /// 바 단위 실패는 통계에 집계하고 나머지 바는 계속 처리합니다.
    pub async fn collect(&self, count: usize) -> Result<CollectionStats> {
        let start = Instant::now();
        let mut stats = CollectionStats::new();

        let Some(bars) = self.fetch_daily(count).await else {
            tracing::warn!("과거 일봉 없음, 사이클 건너뜀");
            stats.empty += 1;
            stats.elapsed = start.elapsed();
            return Ok(stats);
        };

        for bar in &bars {
            stats.total += 1;

            if bar.is_empty() {
                tracing::debug!(timestamp = %bar.timestamp, "가격이 없는 바 건너뜀");
                stats.empty += 1;
                continue;
            }

            match merge_historical(self.store.as_ref(), bar.day(), bar).await {
                Ok(_) => stats.applied += 1,
                Err(e) => {
                    tracing::error!(day = %bar.day(), error = %e, "과거 일봉 저장 실패");
                    stats.errors += 1;
                }
            }
        }

        stats.elapsed = start.elapsed();
        Ok(stats)
    }
}

#[async_trait]
impl Job for HistoricalJob {
    fn name(&self) -> &str {
        "historical"
    }

    async fn run_cycle(&self) -> anyhow::Result<()> {
        let stats = self.collect(self.bars).await?;
        stats.log_summary("과거 일봉 병합");
        if stats.total > 0 && stats.applied == 0 && stats.errors > 0 {
            anyhow::bail!("{}개 일봉 모두 저장 실패", stats.errors);
        }
        Ok(())
    }
}

/// 일회성 백필: 최근 `bars`개의 일봉을 병합합니다.
pub async fn backfill(job: &HistoricalJob, bars: usize) -> Result<CollectionStats> {
    tracing::info!(bars, "백필 시작");
    let stats = job.collect(bars).await?;
    stats.log_summary("백필");
    Ok(stats)
}
