//! BTC 도미넌스 수집기 CLI.

use clap::{Parser, Subcommand};
use dominance_collector::modules::{
    self, HistoricalJob, MonitorJob, PeriodicTask, RealtimeJob, Schedule, SystemClock,
};
use dominance_collector::CollectorConfig;
use dominance_core::{init_logging, LogConfig};
use dominance_data::{MemoryRecordStore, PgRecordStore, RecordStore};
use dominance_feed::{BarSource, TradingViewClient};
use dominance_notification::{DataMonitor, MonitorConfig, NotificationManager, TelegramSender};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dominance-collector")]
#[command(about = "BTC Dominance Collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 데몬 모드: 과거/실시간 루프와 모니터를 Ctrl-C까지 실행
    Daemon,

    /// 과거 경로 사이클 1회 실행
    Historical,

    /// 실시간 경로 사이클 1회 실행
    Realtime,

    /// 일회성 백필
    Backfill {
        /// 조회할 일봉 수 (기본: BACKFILL_BARS)
        #[arg(long)]
        bars: Option<usize>,

        /// 조회 전에 가져올 기존 일봉 CSV (기본: HISTORICAL_CSV)
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// 레코드 전체 삭제
    Purge {
        /// 확인 없이 삭제
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 로깅 초기화
    let level = format!(
        "dominance_collector={0},dominance_feed={0},dominance_data={0},dominance_notification={0}",
        cli.log_level
    );
    init_logging(LogConfig::new(level).with_env_format())?;

    tracing::info!("BTC Dominance Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env()?;
    tracing::debug!(
        table = %config.table,
        symbol = %config.source.symbol,
        exchange = %config.source.exchange,
        "설정 로드 완료"
    );

    // 저장소 연결
    let (store, pool) = open_store(&config).await?;
    let source: Arc<dyn BarSource> = Arc::new(TradingViewClient::default());
    let clock = Arc::new(SystemClock);

    let historical = HistoricalJob::new(
        source.clone(),
        store.clone(),
        &config.source.symbol,
        &config.source.exchange,
    )
    .with_bars(config.historical.bars)
    .with_policy(config.retry_policy())
    .with_fallback_symbol(config.source.fallback_symbol.clone());

    let monitor = build_monitor(&config);
    let mut realtime = RealtimeJob::new(
        source,
        store.clone(),
        clock.clone(),
        &config.source.symbol,
        &config.source.exchange,
    )
    .with_interval(config.realtime.interval)
    .with_policy(config.retry_policy());
    if let Some(monitor) = &monitor {
        realtime = realtime.with_monitor(monitor.clone());
    }

    // 명령 실행
    match cli.command {
        Commands::Historical => {
            let stats = historical.collect(config.historical.bars).await?;
            stats.log_summary("과거 일봉 병합");
        }
        Commands::Realtime => match realtime.collect_once().await? {
            Some(record) => tracing::info!(day = %record.day, "실시간 사이클 완료"),
            None => tracing::warn!("실시간 샘플 없음"),
        },
        Commands::Backfill { bars, csv } => {
            if let Some(path) = csv.or_else(|| config.historical.csv_path.clone()) {
                // 가져오기 실패해도 조회는 계속
                if let Err(e) = modules::import_csv(store.as_ref(), &path).await {
                    tracing::error!(path = %path.display(), error = %e, "CSV 가져오기 실패");
                }
            }
            let bars = bars.unwrap_or(config.historical.backfill_bars);
            modules::backfill(&historical, bars).await?;
        }
        Commands::Purge { yes } => {
            if !yes {
                tracing::warn!("--yes 없이 실행됨, 삭제하지 않습니다");
                return Err("purge requires --yes".into());
            }
            let report = modules::purge(store.as_ref()).await?;
            println!(
                "before={} deleted={} after={}",
                report.before, report.deleted, report.after
            );
        }
        Commands::Daemon => {
            let stop_timeout = config.stop_timeout();
            let mut tasks = Vec::new();

            if config.historical.enabled {
                tasks.push(
                    PeriodicTask::new(
                        Arc::new(historical),
                        Schedule::DailyAt(config.historical.trigger_at),
                        clock.clone(),
                    )
                    .with_stop_timeout(stop_timeout),
                );
            }
            if config.realtime.enabled {
                tasks.push(
                    PeriodicTask::new(
                        Arc::new(realtime),
                        Schedule::Every(config.realtime.poll_interval()),
                        clock.clone(),
                    )
                    .with_stop_timeout(stop_timeout),
                );
            }
            if let Some(monitor) = monitor {
                tasks.push(
                    PeriodicTask::new(
                        Arc::new(MonitorJob::new(monitor, clock.clone())),
                        Schedule::Every(config.monitor.check_interval()),
                        clock.clone(),
                    )
                    .with_stop_timeout(stop_timeout),
                );
            }

            if tasks.is_empty() {
                tracing::warn!("활성화된 루프가 없습니다");
            }

            tracing::info!(tasks = tasks.len(), "=== 데몬 모드 시작 ===");
            for task in &tasks {
                task.start();
            }

            shutdown_signal().await;

            for task in &tasks {
                if !task.stop().await {
                    tracing::warn!(job = task.name(), "사이클 종료를 기다리지 못했습니다");
                }
            }
        }
    }

    if let Some(pool) = pool {
        pool.close().await;
    }
    tracing::info!("BTC Dominance Collector 종료");

    Ok(())
}

/// `DATABASE_URL`이 있으면 PostgreSQL, 없으면 인메모리 저장소를 엽니다.
async fn open_store(
    config: &CollectorConfig,
) -> Result<(Arc<dyn RecordStore>, Option<sqlx::PgPool>), Box<dyn std::error::Error>> {
    let Some(url) = &config.database_url else {
        tracing::warn!("DATABASE_URL 미설정, 인메모리 저장소 사용 (프로세스 종료 시 데이터 소실)");
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        return Ok((store, None));
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await?;
    tracing::info!("데이터베이스 연결 성공");

    let store = PgRecordStore::new(pool.clone(), &config.table)?;
    store.ensure_schema().await?;
    let store: Arc<dyn RecordStore> = Arc::new(store);
    Ok((store, Some(pool)))
}

/// 텔레그램 자격 증명이 있고 모니터가 활성화된 경우에만 모니터를 만듭니다.
fn build_monitor(config: &CollectorConfig) -> Option<Arc<DataMonitor>> {
    if !config.monitor.enabled {
        return None;
    }

    let mut notifier = NotificationManager::new();
    match TelegramSender::from_env() {
        Ok(Some(sender)) => notifier.add_sender(sender),
        Ok(None) => {}
        Err(e) => tracing::error!(error = %e, "텔레그램 전송기 생성 실패"),
    }
    if !notifier.has_enabled_sender() {
        tracing::info!("알림 전송기 없음, 신선도 모니터 비활성화");
        return None;
    }

    let monitor_config = MonitorConfig {
        enabled: true,
        check_interval: config.monitor.check_interval(),
        data_timeout: config.monitor.data_timeout(),
        symbol: format!("{}:{}", config.source.exchange, config.source.symbol),
    };
    Some(Arc::new(DataMonitor::new(monitor_config, notifier)))
}

/// Ctrl+C 또는 SIGTERM 대기.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C 핸들러 설치 실패");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM 핸들러 설치 실패");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("종료 신호 수신 (Ctrl+C), 데몬 종료 중..."),
        _ = terminate => tracing::info!("종료 신호 수신 (SIGTERM), 데몬 종료 중..."),
    }
}
