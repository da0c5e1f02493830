//! Database model types for Diesel ORM.

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;

use super::schema::{price_records, refresh_cursor};
use crate::domain::{Exterior, Price, PriceKey, PriceRecord, RefreshCursor};
use crate::error::StoreError;

/// Database row for a price record.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = price_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PriceRow {
    pub market_hash_name: String,
    pub exterior: String,
    pub stattrack: bool,
    pub app_id: i32,
    pub price: String,
    pub last_updated: String,
    pub last_scraped: String,
    pub update_count: i32,
}

/// Database row for the single refresh cursor.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = refresh_cursor)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CursorRow {
    pub id: i32,
    pub last_scheduler_run: String,
    pub next_scheduler_run: String,
}

/// Fixed-width UTC timestamp so text order matches time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::IntegrityViolation(format!("bad timestamp '{value}': {e}")))
}

/// SQLite has no unsigned integers; app ids fit in i32.
pub fn app_id_column(key: &PriceKey) -> Result<i32, StoreError> {
    i32::try_from(key.app_id)
        .map_err(|_| StoreError::IntegrityViolation(format!("app_id {} out of range", key.app_id)))
}

impl PriceRow {
    pub fn into_record(self) -> Result<PriceRecord, StoreError> {
        let corrupt = |field: &str, reason: String| {
            StoreError::IntegrityViolation(format!(
                "{}: bad {field}: {reason}",
                self.market_hash_name
            ))
        };
        let exterior = self
            .exterior
            .parse::<Exterior>()
            .map_err(|e: String| corrupt("exterior", e))?;
        let price = self.price.parse::<Price>().map_err(|e: String| corrupt("price", e))?;
        let app_id =
            u32::try_from(self.app_id).map_err(|e| corrupt("app_id", e.to_string()))?;
        let update_count =
            u32::try_from(self.update_count).map_err(|e| corrupt("update_count", e.to_string()))?;
        let last_updated = parse_timestamp(&self.last_updated)?;
        let last_scraped = parse_timestamp(&self.last_scraped)?;

        Ok(PriceRecord {
            key: PriceKey::new(self.market_hash_name, exterior, self.stattrack, app_id),
            price,
            last_updated,
            last_scraped,
            update_count,
        })
    }
}

impl CursorRow {
    /// The table holds at most this one row.
    pub const SINGLETON_ID: i32 = 1;

    pub fn from_cursor(cursor: &RefreshCursor) -> Self {
        Self {
            id: Self::SINGLETON_ID,
            last_scheduler_run: format_timestamp(cursor.last_scheduler_run),
            next_scheduler_run: format_timestamp(cursor.next_scheduler_run),
        }
    }

    pub fn into_cursor(self) -> Result<RefreshCursor, StoreError> {
        Ok(RefreshCursor {
            last_scheduler_run: parse_timestamp(&self.last_scheduler_run)?,
            next_scheduler_run: parse_timestamp(&self.next_scheduler_run)?,
        })
    }
}
