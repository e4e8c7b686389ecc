use meter_core::{
    DailyPoint, DateRange, GlobalRollup, GlobalTotals, ModelCost, TenantCost, TenantSummary,
};
use rusqlite::params;

use crate::Db;
use crate::error::Result;
use crate::helpers::from_sql_count;

const TOTAL_TOKENS_SQL: &str =
    "SUM(input_tokens + output_tokens + cache_read_tokens + cache_write_tokens)";

impl Db {
    pub fn tenant_summary(&self, tenant_id: &str, range: &DateRange) -> Result<TenantSummary> {
        let sql = format!(
            r#"
            SELECT
              COALESCE(SUM(input_tokens), 0),
              COALESCE(SUM(output_tokens), 0),
              COALESCE(SUM(cache_read_tokens), 0),
              COALESCE(SUM(cache_write_tokens), 0),
              COALESCE({TOTAL_TOKENS_SQL}, 0),
              COALESCE(SUM(cost_usd), 0.0),
              COALESCE(SUM(request_count), 0),
              COALESCE(SUM(session_count), 0),
              COUNT(DISTINCT usage_date),
              MIN(usage_date),
              MAX(usage_date)
            FROM daily_aggregate
            WHERE tenant_id = ?1 AND usage_date >= ?2 AND usage_date <= ?3
            "#
        );
        let summary = self.conn.query_row(
            &sql,
            params![tenant_id, range.start_key(), range.end_key()],
            |row| {
                Ok(TenantSummary {
                    tenant_id: tenant_id.to_string(),
                    input_tokens: from_sql_count(row.get(0)?),
                    output_tokens: from_sql_count(row.get(1)?),
                    cache_read_tokens: from_sql_count(row.get(2)?),
                    cache_write_tokens: from_sql_count(row.get(3)?),
                    total_tokens: from_sql_count(row.get(4)?),
                    total_cost_usd: row.get(5)?,
                    request_count: from_sql_count(row.get(6)?),
                    session_count: from_sql_count(row.get(7)?),
                    active_days: from_sql_count(row.get(8)?),
                    first_date: row.get(9)?,
                    last_date: row.get(10)?,
                })
            },
        )?;
        Ok(summary)
    }

    pub fn tenant_daily(&self, tenant_id: &str, range: &DateRange) -> Result<Vec<DailyPoint>> {
        let sql = format!(
            r#"
            SELECT usage_date, {TOTAL_TOKENS_SQL}, SUM(cost_usd), SUM(request_count)
            FROM daily_aggregate
            WHERE tenant_id = ?1 AND usage_date >= ?2 AND usage_date <= ?3
            GROUP BY usage_date
            ORDER BY usage_date ASC
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![tenant_id, range.start_key(), range.end_key()],
            |row| {
                Ok(DailyPoint {
                    date: row.get(0)?,
                    total_tokens: from_sql_count(row.get(1)?),
                    cost_usd: row.get(2)?,
                    request_count: from_sql_count(row.get(3)?),
                })
            },
        )?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn tenant_model_costs(&self, tenant_id: &str, range: &DateRange) -> Result<Vec<ModelCost>> {
        let sql = format!(
            r#"
            SELECT model, {TOTAL_TOKENS_SQL}, SUM(cost_usd), SUM(request_count)
            FROM daily_aggregate
            WHERE tenant_id = ?1 AND usage_date >= ?2 AND usage_date <= ?3
            GROUP BY model
            ORDER BY SUM(cost_usd) DESC, model ASC
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![tenant_id, range.start_key(), range.end_key()],
            |row| {
                Ok(ModelCost {
                    model: row.get(0)?,
                    total_tokens: from_sql_count(row.get(1)?),
                    cost_usd: row.get(2)?,
                    request_count: from_sql_count(row.get(3)?),
                })
            },
        )?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Cross-tenant totals, daily trend, model split and the `top_n`
    /// tenants by cost.
    pub fn global_rollup(&self, range: &DateRange, top_n: usize) -> Result<GlobalRollup> {
        let start = range.start_key();
        let end = range.end_key();

        let totals_sql = format!(
            r#"
            SELECT
              COALESCE({TOTAL_TOKENS_SQL}, 0),
              COALESCE(SUM(cost_usd), 0.0),
              COALESCE(SUM(request_count), 0),
              COALESCE(SUM(session_count), 0),
              COUNT(DISTINCT tenant_id)
            FROM daily_aggregate
            WHERE usage_date >= ?1 AND usage_date <= ?2
            "#
        );
        let totals = self
            .conn
            .query_row(&totals_sql, params![start, end], |row| {
                Ok(GlobalTotals {
                    total_tokens: from_sql_count(row.get(0)?),
                    cost_usd: row.get(1)?,
                    request_count: from_sql_count(row.get(2)?),
                    session_count: from_sql_count(row.get(3)?),
                    tenant_count: from_sql_count(row.get(4)?),
                })
            })?;

        let daily_sql = format!(
            r#"
            SELECT usage_date, {TOTAL_TOKENS_SQL}, SUM(cost_usd), SUM(request_count)
            FROM daily_aggregate
            WHERE usage_date >= ?1 AND usage_date <= ?2
            GROUP BY usage_date
            ORDER BY usage_date ASC
            "#
        );
        let mut stmt = self.conn.prepare(&daily_sql)?;
        let daily = stmt
            .query_map(params![start, end], |row| {
                Ok(DailyPoint {
                    date: row.get(0)?,
                    total_tokens: from_sql_count(row.get(1)?),
                    cost_usd: row.get(2)?,
                    request_count: from_sql_count(row.get(3)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let models_sql = format!(
            r#"
            SELECT model, {TOTAL_TOKENS_SQL}, SUM(cost_usd), SUM(request_count)
            FROM daily_aggregate
            WHERE usage_date >= ?1 AND usage_date <= ?2
            GROUP BY model
            ORDER BY SUM(cost_usd) DESC, model ASC
            "#
        );
        let mut stmt = self.conn.prepare(&models_sql)?;
        let models = stmt
            .query_map(params![start, end], |row| {
                Ok(ModelCost {
                    model: row.get(0)?,
                    total_tokens: from_sql_count(row.get(1)?),
                    cost_usd: row.get(2)?,
                    request_count: from_sql_count(row.get(3)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let tenants_sql = format!(
            r#"
            SELECT tenant_id, {TOTAL_TOKENS_SQL}, SUM(cost_usd), SUM(request_count)
            FROM daily_aggregate
            WHERE usage_date >= ?1 AND usage_date <= ?2
            GROUP BY tenant_id
            ORDER BY SUM(cost_usd) DESC, tenant_id ASC
            LIMIT ?3
            "#
        );
        let limit = i64::try_from(top_n).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&tenants_sql)?;
        let top_tenants = stmt
            .query_map(params![start, end, limit], |row| {
                Ok(TenantCost {
                    tenant_id: row.get(0)?,
                    total_tokens: from_sql_count(row.get(1)?),
                    cost_usd: row.get(2)?,
                    request_count: from_sql_count(row.get(3)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(GlobalRollup {
            range: *range,
            totals,
            daily,
            models,
            top_tenants,
        })
    }
}
