use chrono::{NaiveDate, Utc};
use meter_core::{AggregateDelta, DailyAggregate, DateRange, format_date, format_ts};
use rusqlite::{Connection, params};

use crate::Db;
use crate::error::Result;
use crate::helpers::{row_to_daily_aggregate, to_sql_count};

pub(crate) fn upsert_aggregate_in(
    conn: &Connection,
    tenant_id: &str,
    date: &str,
    model: &str,
    delta: &AggregateDelta,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO daily_aggregate (
          tenant_id, usage_date, model, input_tokens, output_tokens,
          cache_read_tokens, cache_write_tokens, cost_usd, request_count,
          session_count, updated_at
        ) VALUES (
          ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11
        )
        ON CONFLICT(tenant_id, usage_date, model) DO UPDATE SET
          input_tokens = input_tokens + excluded.input_tokens,
          output_tokens = output_tokens + excluded.output_tokens,
          cache_read_tokens = cache_read_tokens + excluded.cache_read_tokens,
          cache_write_tokens = cache_write_tokens + excluded.cache_write_tokens,
          cost_usd = cost_usd + excluded.cost_usd,
          request_count = request_count + excluded.request_count,
          session_count = session_count + excluded.session_count,
          updated_at = excluded.updated_at
        "#,
        params![
            tenant_id,
            date,
            model,
            to_sql_count(delta.input_tokens),
            to_sql_count(delta.output_tokens),
            to_sql_count(delta.cache_read_tokens),
            to_sql_count(delta.cache_write_tokens),
            delta.cost_usd,
            to_sql_count(delta.request_count),
            to_sql_count(delta.session_count),
            format_ts(Utc::now()),
        ],
    )?;
    Ok(())
}

impl Db {
    /// Adds `delta` to the (tenant, date, model) row, creating it if needed.
    pub fn upsert_daily_aggregate(
        &self,
        tenant_id: &str,
        date: NaiveDate,
        model: &str,
        delta: &AggregateDelta,
    ) -> Result<()> {
        upsert_aggregate_in(&self.conn, tenant_id, &format_date(date), model, delta)
    }

    pub fn list_daily_aggregates(
        &self,
        tenant_id: &str,
        range: &DateRange,
    ) -> Result<Vec<DailyAggregate>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT tenant_id, usage_date, model, input_tokens, output_tokens,
                   cache_read_tokens, cache_write_tokens, cost_usd, request_count,
                   session_count
            FROM daily_aggregate
            WHERE tenant_id = ?1 AND usage_date >= ?2 AND usage_date <= ?3
            ORDER BY usage_date ASC, model ASC
            "#,
        )?;
        let rows = stmt.query_map(
            params![tenant_id, range.start_key(), range.end_key()],
            row_to_daily_aggregate,
        )?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn tenant_cost_total(&self, tenant_id: &str) -> Result<f64> {
        let cost: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(cost_usd), 0.0) FROM daily_aggregate WHERE tenant_id = ?1",
            params![tenant_id],
            |row| row.get(0),
        )?;
        Ok(cost)
    }

    pub fn tenant_cost_on(&self, tenant_id: &str, date: NaiveDate) -> Result<f64> {
        let cost: f64 = self.conn.query_row(
            r#"
            SELECT COALESCE(SUM(cost_usd), 0.0)
            FROM daily_aggregate
            WHERE tenant_id = ?1 AND usage_date = ?2
            "#,
            params![tenant_id, format_date(date)],
            |row| row.get(0),
        )?;
        Ok(cost)
    }
}
