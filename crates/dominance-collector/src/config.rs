//! 환경변수 기반 설정 모듈.

use crate::error::CollectorError;
use crate::Result;
use chrono::NaiveTime;
use dominance_core::Interval;
use dominance_data::DEFAULT_TABLE;
use dominance_feed::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL (없으면 인메모리 저장소)
    pub database_url: Option<String>,
    /// 레코드 테이블 이름
    pub table: String,
    /// 데이터 제공자 설정
    pub source: SourceConfig,
    /// 과거 경로 설정
    pub historical: HistoricalConfig,
    /// 실시간 경로 설정
    pub realtime: RealtimeConfig,
    /// 신선도 모니터 설정
    pub monitor: MonitorSettings,
    /// 루프 정지 시 최대 대기 시간 (초)
    pub stop_timeout_secs: u64,
}

/// 데이터 제공자 설정
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// 심볼 (예: BTC.D)
    pub symbol: String,
    /// 기본 심볼에 과거 데이터가 없을 때 조회할 심볼
    pub fallback_symbol: Option<String>,
    /// 거래소 (예: CRYPTOCAP)
    pub exchange: String,
    /// 조회 최대 시도 횟수
    pub fetch_attempts: u32,
    /// 시도 사이 대기 시간 (초)
    pub fetch_backoff_secs: u64,
}

/// 과거 경로 설정
#[derive(Debug, Clone)]
pub struct HistoricalConfig {
    /// 루프 활성화
    pub enabled: bool,
    /// 사이클당 조회할 일봉 수
    pub bars: usize,
    /// 매일 실행 시각 (UTC)
    pub trigger_at: NaiveTime,
    /// 백필 명령이 조회할 일봉 수
    pub backfill_bars: usize,
    /// 백필 전에 가져올 기존 일봉 CSV
    pub csv_path: Option<PathBuf>,
}

/// 실시간 경로 설정
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// 루프 활성화
    pub enabled: bool,
    /// 폴링 주기 (초)
    pub poll_secs: u64,
    /// 샘플 조회 간격
    pub interval: Interval,
}

/// 신선도 모니터 설정
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// 모니터 활성화
    pub enabled: bool,
    /// 점검 주기 (초)
    pub check_secs: u64,
    /// 중단 판단 기준 (초)
    pub data_timeout_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            table: DEFAULT_TABLE.to_string(),
            source: SourceConfig {
                symbol: "BTC.D".to_string(),
                fallback_symbol: Some("BTCD".to_string()),
                exchange: "CRYPTOCAP".to_string(),
                fetch_attempts: 3,
                fetch_backoff_secs: 2,
            },
            historical: HistoricalConfig {
                enabled: true,
                bars: 5,
                trigger_at: NaiveTime::from_hms_opt(0, 1, 0).unwrap_or(NaiveTime::MIN),
                backfill_bars: 10_000,
                csv_path: None,
            },
            realtime: RealtimeConfig {
                enabled: true,
                poll_secs: 30,
                interval: Interval::D1,
            },
            monitor: MonitorSettings {
                enabled: true,
                check_secs: 30,
                data_timeout_secs: 60,
            },
            stop_timeout_secs: 2,
        }
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let trigger_at = match std::env::var("HISTORICAL_TRIGGER_UTC") {
            Ok(v) => parse_trigger_time(&v)?,
            Err(_) => defaults.historical.trigger_at,
        };

        let interval = match std::env::var("REALTIME_INTERVAL") {
            Ok(v) => v
                .parse::<Interval>()
                .map_err(|e| CollectorError::Config(format!("REALTIME_INTERVAL: {e}")))?,
            Err(_) => defaults.realtime.interval,
        };

        let config = Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            table: std::env::var("DOMINANCE_TABLE").unwrap_or(defaults.table),
            source: SourceConfig {
                symbol: std::env::var("DOMINANCE_SYMBOL").unwrap_or(defaults.source.symbol),
                // 빈 값이면 대체 조회 비활성화
                fallback_symbol: match std::env::var("DOMINANCE_FALLBACK_SYMBOL") {
                    Ok(v) => Some(v).filter(|v| !v.is_empty()),
                    Err(_) => defaults.source.fallback_symbol,
                },
                exchange: std::env::var("DOMINANCE_EXCHANGE").unwrap_or(defaults.source.exchange),
                fetch_attempts: env_var_parse("FETCH_ATTEMPTS", defaults.source.fetch_attempts),
                fetch_backoff_secs: env_var_parse(
                    "FETCH_BACKOFF_SECS",
                    defaults.source.fetch_backoff_secs,
                ),
            },
            historical: HistoricalConfig {
                enabled: env_var_bool("HISTORICAL_ENABLED", defaults.historical.enabled),
                bars: env_var_parse("HISTORICAL_BARS", defaults.historical.bars),
                trigger_at,
                backfill_bars: env_var_parse("BACKFILL_BARS", defaults.historical.backfill_bars),
                csv_path: std::env::var("HISTORICAL_CSV")
                    .ok()
                    .filter(|v| !v.is_empty())
                    .map(PathBuf::from),
            },
            realtime: RealtimeConfig {
                enabled: env_var_bool("REALTIME_ENABLED", defaults.realtime.enabled),
                poll_secs: env_var_parse("REALTIME_POLL_SECS", defaults.realtime.poll_secs),
                interval,
            },
            monitor: MonitorSettings {
                enabled: env_var_bool("MONITOR_ENABLED", defaults.monitor.enabled),
                check_secs: env_var_parse("MONITOR_CHECK_SECS", defaults.monitor.check_secs),
                data_timeout_secs: env_var_parse(
                    "MONITOR_DATA_TIMEOUT_SECS",
                    defaults.monitor.data_timeout_secs,
                ),
            },
            stop_timeout_secs: env_var_parse("STOP_TIMEOUT_SECS", defaults.stop_timeout_secs),
        };

        config.validate()?;
        Ok(config)
    }

    /// 값 범위를 검사합니다.
    pub fn validate(&self) -> Result<()> {
        if self.source.fetch_attempts == 0 {
            return Err(CollectorError::Config(
                "FETCH_ATTEMPTS는 1 이상이어야 합니다".to_string(),
            ));
        }
        if self.realtime.poll_secs == 0 {
            return Err(CollectorError::Config(
                "REALTIME_POLL_SECS는 1 이상이어야 합니다".to_string(),
            ));
        }
        if self.historical.bars == 0 || self.historical.backfill_bars == 0 {
            return Err(CollectorError::Config(
                "HISTORICAL_BARS, BACKFILL_BARS는 1 이상이어야 합니다".to_string(),
            ));
        }
        Ok(())
    }

    /// 조회 재시도 정책
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.source.fetch_attempts,
            Duration::from_secs(self.source.fetch_backoff_secs),
        )
    }

    /// 루프 정지 대기 시간
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

impl RealtimeConfig {
    /// 폴링 주기를 Duration으로 반환
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs)
    }
}

impl MonitorSettings {
    /// 점검 주기를 Duration으로 반환
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_secs)
    }

    /// 중단 판단 기준을 Duration으로 반환
    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_secs)
    }
}

/// `HH:MM:SS` 또는 `HH:MM` 형식의 UTC 시각 파싱
fn parse_trigger_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|e| CollectorError::Config(format!("HISTORICAL_TRIGGER_UTC '{value}': {e}")))
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 값 파싱
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}
