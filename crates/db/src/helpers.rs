use meter_core::{DailyAggregate, UsageRecord, UsageSource};
use rusqlite::Row;
use rusqlite::types::Type;

use crate::error::DbError;

pub(crate) fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn from_sql_count(value: i64) -> u64 {
    value.max(0) as u64
}

pub(crate) fn row_to_usage_record(row: &Row<'_>) -> std::result::Result<UsageRecord, rusqlite::Error> {
    let source: String = row.get(9)?;
    let source = UsageSource::parse(&source).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            9,
            Type::Text,
            Box::new(DbError::UnknownSource(source.clone())),
        )
    })?;
    Ok(UsageRecord {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        session_id: row.get(2)?,
        model: row.get(3)?,
        input_tokens: from_sql_count(row.get(4)?),
        output_tokens: from_sql_count(row.get(5)?),
        cache_read_tokens: from_sql_count(row.get(6)?),
        cache_write_tokens: from_sql_count(row.get(7)?),
        cost_usd: row.get(8)?,
        source,
        ts: row.get(10)?,
        usage_date: row.get(11)?,
    })
}

pub(crate) fn row_to_daily_aggregate(
    row: &Row<'_>,
) -> std::result::Result<DailyAggregate, rusqlite::Error> {
    Ok(DailyAggregate {
        tenant_id: row.get(0)?,
        date: row.get(1)?,
        model: row.get(2)?,
        input_tokens: from_sql_count(row.get(3)?),
        output_tokens: from_sql_count(row.get(4)?),
        cache_read_tokens: from_sql_count(row.get(5)?),
        cache_write_tokens: from_sql_count(row.get(6)?),
        cost_usd: row.get(7)?,
        request_count: from_sql_count(row.get(8)?),
        session_count: from_sql_count(row.get(9)?),
    })
}
