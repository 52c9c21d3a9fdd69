//! PostgreSQL 레코드 저장소.
//!
//! 패치 하나를 `INSERT .. ON CONFLICT (timestamp_ms) DO UPDATE .. RETURNING`
//! 단일 문장으로 변환합니다. `Max`/`Min` 연산은 `GREATEST`/`LEAST`로 표현되며,
//! 둘 다 NULL을 무시하므로 비어 있는 값은 새 값으로 채워집니다.
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! let pool = PgPool::connect(&database_url).await?;
//! let store = PgRecordStore::new(pool, "raw_btc_dominance")?;
//! store.ensure_schema().await?;
//! let record = store.upsert(&historical_patch(day, &bar)).await?;
//! ```

use crate::error::{DataError, Result};
use crate::storage::RecordStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dominance_core::{DailyRecord, FieldOp, RecordPatch};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::{FromRow, QueryBuilder};
use tracing::{debug, info, instrument};

/// 기본 테이블 이름.
pub const DEFAULT_TABLE: &str = "raw_btc_dominance";

const COLUMNS: &str = "timestamp_ms, day, open, high, low, close, volume, \
     current_open, current_high, current_low, current_close, current_volume, \
     last_update, record_kind";

/// 일별 레코드 데이터베이스 행.
#[derive(Debug, Clone, FromRow)]
pub struct DailyRecordRow {
    pub timestamp_ms: i64,
    pub day: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub current_open: Option<f64>,
    pub current_high: Option<f64>,
    pub current_low: Option<f64>,
    pub current_close: Option<f64>,
    pub current_volume: Option<f64>,
    pub last_update: Option<DateTime<Utc>>,
    pub record_kind: String,
}

impl TryFrom<DailyRecordRow> for DailyRecord {
    type Error = DataError;

    fn try_from(row: DailyRecordRow) -> Result<Self> {
        Ok(DailyRecord {
            day: row.day,
            timestamp_ms: row.timestamp_ms,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            current_open: row.current_open,
            current_high: row.current_high,
            current_low: row.current_low,
            current_close: row.current_close,
            current_volume: row.current_volume,
            last_update: row.last_update,
            record_kind: row.record_kind.parse()?,
        })
    }
}

/// PostgreSQL 기반 `RecordStore`.
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
    table: String,
}

impl PgRecordStore {
    /// 새 저장소를 생성합니다. 테이블 이름은 영숫자와 `_`만 허용합니다.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        Ok(Self { pool, table })
    }

    /// 테이블 이름.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// 테이블이 없으면 생성합니다.
    ///
    /// `symbol`은 레거시 컬럼으로, 모든 쓰기에서 NULL로 지워집니다.
    pub async fn ensure_schema(&self) -> Result<()> {
        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                timestamp_ms    BIGINT PRIMARY KEY,
                day             DATE NOT NULL,
                open            DOUBLE PRECISION,
                high            DOUBLE PRECISION,
                low             DOUBLE PRECISION,
                close           DOUBLE PRECISION,
                volume          DOUBLE PRECISION,
                current_open    DOUBLE PRECISION,
                current_high    DOUBLE PRECISION,
                current_low     DOUBLE PRECISION,
                current_close   DOUBLE PRECISION,
                current_volume  DOUBLE PRECISION,
                last_update     TIMESTAMPTZ,
                record_kind     TEXT NOT NULL,
                symbol          TEXT
            )
            "#,
            table = self.table
        );
        sqlx::query(&create_table).execute(&self.pool).await?;

        let create_index = format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {table}_day_idx ON {table} (day)",
            table = self.table
        );
        sqlx::query(&create_index).execute(&self.pool).await?;

        info!(table = %self.table, "schema ready");
        Ok(())
    }
}

fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(DataError::ConfigError(format!("invalid table name: {name:?}")))
    }
}

/// 패치를 단일 upsert 문장으로 변환합니다.
pub fn build_upsert<'a>(table: &str, patch: &'a RecordPatch) -> QueryBuilder<'a, Postgres> {
    let seed = &patch.on_insert;
    let mut qb = QueryBuilder::new(format!("INSERT INTO {table} ({COLUMNS}, symbol) VALUES ("));
    {
        let mut values = qb.separated(", ");
        values
            .push_bind(patch.timestamp_ms)
            .push_bind(seed.day)
            .push_bind(seed.open)
            .push_bind(seed.high)
            .push_bind(seed.low)
            .push_bind(seed.close)
            .push_bind(seed.volume)
            .push_bind(seed.current_open)
            .push_bind(seed.current_high)
            .push_bind(seed.current_low)
            .push_bind(seed.current_close)
            .push_bind(seed.current_volume)
            .push_bind(seed.last_update)
            .push_bind(seed.record_kind.as_str())
            .push("NULL");
    }
    qb.push(") ON CONFLICT (timestamp_ms) DO UPDATE SET ");

    {
        let mut sets = qb.separated(", ");
        for op in &patch.on_update {
            let column = op.field_name();
            match *op {
                FieldOp::Set(_, value) => {
                    sets.push(format!("{column} = "));
                    sets.push_bind_unseparated(value);
                }
                FieldOp::Max(_, value) => {
                    sets.push(format!("{column} = GREATEST({table}.{column}, "));
                    sets.push_bind_unseparated(value);
                    sets.push_unseparated(")");
                }
                FieldOp::Min(_, value) => {
                    sets.push(format!("{column} = LEAST({table}.{column}, "));
                    sets.push_bind_unseparated(value);
                    sets.push_unseparated(")");
                }
                FieldOp::SetDay(day) => {
                    sets.push(format!("{column} = "));
                    sets.push_bind_unseparated(day);
                }
                FieldOp::SetLastUpdate(at) => {
                    sets.push(format!("{column} = "));
                    sets.push_bind_unseparated(at);
                }
            }
        }
        for field in patch.unset {
            sets.push(format!("{field} = NULL"));
        }
    }

    qb.push(format!(" RETURNING {COLUMNS}"));
    qb
}

#[async_trait]
impl RecordStore for PgRecordStore {
    #[instrument(skip(self, patch), fields(timestamp_ms = patch.timestamp_ms))]
    async fn upsert(&self, patch: &RecordPatch) -> Result<DailyRecord> {
        let mut qb = build_upsert(&self.table, patch);
        let row: DailyRecordRow = qb.build_query_as().fetch_one(&self.pool).await?;
        debug!(fields = ?patch.touched_fields(), "record upserted");
        row.try_into()
    }

    async fn find_one(&self, timestamp_ms: i64) -> Result<Option<DailyRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE timestamp_ms = $1",
            self.table
        );
        let row: Option<DailyRecordRow> = sqlx::query_as(&sql)
            .bind(timestamp_ms)
            .fetch_optional(&self.pool)
            .await?;
        row.map(DailyRecord::try_from).transpose()
    }

    async fn latest(&self) -> Result<Option<DailyRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} ORDER BY timestamp_ms DESC LIMIT 1",
            self.table
        );
        let row: Option<DailyRecordRow> = sqlx::query_as(&sql).fetch_optional(&self.pool).await?;
        row.map(DailyRecord::try_from).transpose()
    }

    async fn count(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn delete_all(&self) -> Result<u64> {
        let sql = format!("DELETE FROM {}", self.table);
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
