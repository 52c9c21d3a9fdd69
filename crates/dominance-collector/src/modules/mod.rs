//! 수집 루프와 관리 명령.

pub mod csv_import;
pub mod historical;
pub mod purge;
pub mod realtime;
pub mod scheduler;

pub use csv_import::{import_csv, read_daily_csv, CsvBars};
pub use historical::{backfill, merge_historical, HistoricalJob};
pub use purge::{purge, PurgeReport};
pub use realtime::{merge_realtime, MonitorJob, RealtimeJob};
pub use scheduler::{Clock, Job, PeriodicTask, Schedule, SystemClock};
