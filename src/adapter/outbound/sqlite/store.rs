//! SQLite price store implementation.
//!
//! Provides persistent storage for price records and the refresh cursor using
//! SQLite and Diesel ORM. Diesel is synchronous, so every call runs on the
//! blocking thread pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::max;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{BigInt, Double, Nullable};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::adapter::outbound::sqlite::database::connection::{
    create_pool, run_migrations, verify_session, DbPool, PoolOptions,
};
use crate::adapter::outbound::sqlite::database::model::{
    app_id_column, format_timestamp, parse_timestamp, CursorRow, PriceRow,
};
use crate::adapter::outbound::sqlite::database::schema::{price_records, refresh_cursor};
use crate::domain::{Price, PriceKey, PriceRecord, RefreshCursor, StoreStats};
use crate::error::StoreError;
use crate::port::{PriceStore, SessionMode, StoreConnector};

/// Map a Diesel error onto the store taxonomy.
///
/// Constraint violations are integrity errors; everything else is treated as
/// a transient connectivity failure.
pub fn classify(err: DieselError) -> StoreError {
    match err {
        DieselError::DatabaseError(
            kind @ (DatabaseErrorKind::UniqueViolation
            | DatabaseErrorKind::ForeignKeyViolation
            | DatabaseErrorKind::NotNullViolation
            | DatabaseErrorKind::CheckViolation),
            info,
        ) => StoreError::IntegrityViolation(format!("{kind:?}: {}", info.message())),
        other => StoreError::ConnectionUnavailable(other.to_string()),
    }
}

#[derive(QueryableByName)]
struct AggregateRow {
    #[diesel(sql_type = BigInt)]
    total: i64,
    #[diesel(sql_type = BigInt)]
    recent: i64,
    #[diesel(sql_type = Nullable<Double>)]
    average: Option<f64>,
}

/// SQLite-backed price store.
pub struct SqlitePriceStore {
    /// Database connection pool.
    pool: DbPool,
}

impl SqlitePriceStore {
    /// Create a new SQLite price store with the given connection pool.
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Run a blocking Diesel closure with a pooled connection.
    ///
    /// Pool exhaustion surfaces as `ConnectionUnavailable`.
    async fn with_conn<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| StoreError::ConnectionUnavailable(e.to_string()))?;
            op(&mut conn)
        })
        .await
        .map_err(|e| StoreError::ConnectionUnavailable(format!("store task failed: {e}")))?
    }

    fn find(conn: &mut SqliteConnection, key: &PriceKey) -> Result<Option<PriceRow>, StoreError> {
        let app_id = app_id_column(key)?;
        price_records::table
            .find((
                key.market_hash_name.as_str(),
                key.exterior.as_str(),
                key.stattrack,
                app_id,
            ))
            .select(PriceRow::as_select())
            .first(conn)
            .optional()
            .map_err(classify)
    }
}

#[async_trait]
impl PriceStore for SqlitePriceStore {
    async fn get(&self, key: &PriceKey) -> Result<Option<PriceRecord>, StoreError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            Self::find(conn, &key)?
                .map(PriceRow::into_record)
                .transpose()
        })
        .await
    }

    async fn upsert(
        &self,
        key: &PriceKey,
        price: Price,
        now: DateTime<Utc>,
    ) -> Result<PriceRecord, StoreError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            let row = PriceRow {
                market_hash_name: key.market_hash_name.clone(),
                exterior: key.exterior.as_str().to_string(),
                stattrack: key.stattrack,
                app_id: app_id_column(&key)?,
                price: price.to_string(),
                last_updated: format_timestamp(now),
                last_scraped: format_timestamp(now),
                update_count: 1,
            };

            conn.transaction::<_, DieselError, _>(|conn| {
                diesel::insert_into(price_records::table)
                    .values(&row)
                    .on_conflict((
                        price_records::market_hash_name,
                        price_records::exterior,
                        price_records::stattrack,
                        price_records::app_id,
                    ))
                    .do_update()
                    .set((
                        price_records::price.eq(&row.price),
                        price_records::last_updated.eq(&row.last_updated),
                        price_records::last_scraped.eq(&row.last_scraped),
                        price_records::update_count.eq(price_records::update_count + 1),
                    ))
                    .execute(conn)?;

                price_records::table
                    .find((
                        row.market_hash_name.as_str(),
                        row.exterior.as_str(),
                        row.stattrack,
                        row.app_id,
                    ))
                    .select(PriceRow::as_select())
                    .first(conn)
            })
            .map_err(classify)?
            .into_record()
        })
        .await
    }

    async fn list_stalest(&self, limit: usize) -> Result<Vec<PriceRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            price_records::table
                .order((
                    price_records::last_scraped.asc(),
                    price_records::market_hash_name.asc(),
                ))
                .limit(limit)
                .select(PriceRow::as_select())
                .load(conn)
                .map_err(classify)?
                .into_iter()
                .map(PriceRow::into_record)
                .collect()
        })
        .await
    }

    async fn stats(&self, fresh_since: DateTime<Utc>) -> Result<StoreStats, StoreError> {
        let since = format_timestamp(fresh_since);
        self.with_conn(move |conn| {
            let aggregate = diesel::sql_query(
                "SELECT COUNT(*) AS total, \
                 COALESCE(SUM(CASE WHEN last_updated >= ? THEN 1 ELSE 0 END), 0) AS recent, \
                 AVG(CAST(price AS REAL)) AS average \
                 FROM price_records",
            )
            .bind::<diesel::sql_types::Text, _>(&since)
            .get_result::<AggregateRow>(conn)
            .map_err(classify)?;

            let last_update: Option<String> = price_records::table
                .select(max(price_records::last_updated))
                .first(conn)
                .map_err(classify)?;

            let average_price = aggregate
                .average
                .and_then(|avg| Decimal::try_from(avg).ok())
                .map(|avg| avg.round_dp(2))
                .unwrap_or(Decimal::ZERO);

            Ok(StoreStats {
                total_count: u64::try_from(aggregate.total).unwrap_or_default(),
                recently_updated_count: u64::try_from(aggregate.recent).unwrap_or_default(),
                average_price,
                last_update: last_update.as_deref().map(parse_timestamp).transpose()?,
            })
        })
        .await
    }

    async fn cursor(&self) -> Result<Option<RefreshCursor>, StoreError> {
        self.with_conn(|conn| {
            refresh_cursor::table
                .find(CursorRow::SINGLETON_ID)
                .select(CursorRow::as_select())
                .first(conn)
                .optional()
                .map_err(classify)?
                .map(CursorRow::into_cursor)
                .transpose()
        })
        .await
    }

    async fn save_cursor(&self, cursor: &RefreshCursor) -> Result<(), StoreError> {
        let row = CursorRow::from_cursor(cursor);
        self.with_conn(move |conn| {
            diesel::replace_into(refresh_cursor::table)
                .values(&row)
                .execute(conn)
                .map_err(classify)?;
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            diesel::sql_query("SELECT 1").execute(conn).map_err(classify)?;
            Ok(())
        })
        .await
    }
}

/// Opens [`SqlitePriceStore`]s for a database URL.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    url: String,
    options: PoolOptions,
}

impl SqliteConnector {
    pub fn new(url: impl Into<String>, options: PoolOptions) -> Self {
        Self {
            url: url.into(),
            options,
        }
    }
}

#[async_trait]
impl StoreConnector for SqliteConnector {
    async fn connect(&self, mode: SessionMode) -> Result<Arc<dyn PriceStore>, StoreError> {
        let url = self.url.clone();
        let options = self.options;
        debug!(mode = %mode, "Opening SQLite price store");

        let pool = tokio::task::spawn_blocking(move || {
            let pool = create_pool(&url, mode, options)?;
            run_migrations(&pool)?;
            verify_session(&pool, mode)?;
            Ok::<_, StoreError>(pool)
        })
        .await
        .map_err(|e| StoreError::ConnectionUnavailable(format!("connect task failed: {e}")))??;

        info!(mode = %mode, "SQLite price store ready");
        Ok(Arc::new(SqlitePriceStore::new(pool)))
    }
}
