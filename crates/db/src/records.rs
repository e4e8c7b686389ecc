use chrono::{DateTime, Utc};
use meter_core::{
    AggregateDelta, DateRange, DedupProbe, NewUsageRecord, UsageRecord, format_date, format_ts,
    retention_cutoff,
};
use rusqlite::{Connection, OptionalExtension, params};

use crate::Db;
use crate::aggregates::upsert_aggregate_in;
use crate::error::Result;
use crate::helpers::{row_to_usage_record, to_sql_count};

fn insert_record_in(conn: &Connection, record: &NewUsageRecord, cost_usd: f64) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO usage_record (
          tenant_id, session_id, model, input_tokens, output_tokens,
          cache_read_tokens, cache_write_tokens, cost_usd, source, ts,
          usage_date, created_at
        ) VALUES (
          ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12
        )
        "#,
        params![
            record.tenant_id,
            record.session_id,
            record.model,
            to_sql_count(record.tokens.input),
            to_sql_count(record.tokens.output),
            to_sql_count(record.tokens.cache_read),
            to_sql_count(record.tokens.cache_write()),
            cost_usd.max(0.0),
            record.source.as_str(),
            record.ts_string(),
            format_date(record.usage_date()),
            format_ts(Utc::now()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Db {
    /// Appends one raw record. `cost_usd` must come from the price table.
    pub fn insert_record(&self, record: &NewUsageRecord, cost_usd: f64) -> Result<i64> {
        insert_record_in(&self.conn, record, cost_usd)
    }

    /// Inserts the raw record and its aggregate delta in one transaction.
    pub fn commit_record(
        &mut self,
        record: &NewUsageRecord,
        cost_usd: f64,
        session_delta: u64,
    ) -> Result<i64> {
        let tx = self.conn.transaction()?;
        let id = insert_record_in(&tx, record, cost_usd)?;
        let delta = AggregateDelta::for_record(&record.tokens, cost_usd.max(0.0), session_delta);
        upsert_aggregate_in(
            &tx,
            &record.tenant_id,
            &format_date(record.usage_date()),
            &record.model,
            &delta,
        )?;
        tx.commit()?;
        Ok(id)
    }

    /// Looks for an earlier delivery of the same event within the dedup
    /// window. With a session id the match is per session, otherwise per
    /// tenant among session-less records.
    pub fn record_exists(&self, probe: &DedupProbe) -> Result<bool> {
        let (from, to) = probe.window();
        let tokens = &probe.tokens;
        let found: Option<i64> = match probe.session_id.as_deref() {
            Some(session_id) => self
                .conn
                .query_row(
                    r#"
                    SELECT id FROM usage_record
                    WHERE session_id = ?1 AND model = ?2
                      AND input_tokens = ?3 AND output_tokens = ?4
                      AND cache_read_tokens = ?5 AND cache_write_tokens = ?6
                      AND ts >= ?7 AND ts <= ?8
                    LIMIT 1
                    "#,
                    params![
                        session_id,
                        probe.model,
                        to_sql_count(tokens.input),
                        to_sql_count(tokens.output),
                        to_sql_count(tokens.cache_read),
                        to_sql_count(tokens.cache_write()),
                        from,
                        to,
                    ],
                    |row| row.get(0),
                )
                .optional()?,
            None => self
                .conn
                .query_row(
                    r#"
                    SELECT id FROM usage_record
                    WHERE tenant_id = ?1 AND session_id IS NULL AND model = ?2
                      AND input_tokens = ?3 AND output_tokens = ?4
                      AND cache_read_tokens = ?5 AND cache_write_tokens = ?6
                      AND ts >= ?7 AND ts <= ?8
                    LIMIT 1
                    "#,
                    params![
                        probe.tenant_id,
                        probe.model,
                        to_sql_count(tokens.input),
                        to_sql_count(tokens.output),
                        to_sql_count(tokens.cache_read),
                        to_sql_count(tokens.cache_write()),
                        from,
                        to,
                    ],
                    |row| row.get(0),
                )
                .optional()?,
        };
        Ok(found.is_some())
    }

    /// Deletes raw records older than `days`; aggregates are kept. A window
    /// reaching past the calendar prunes nothing.
    pub fn prune_older_than(&self, days: u32) -> Result<usize> {
        match retention_cutoff(Utc::now(), days) {
            Some(cutoff) => self.prune_before(cutoff),
            None => Ok(0),
        }
    }

    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM usage_record WHERE ts < ?1",
            params![format_ts(cutoff)],
        )?;
        Ok(removed)
    }

    pub fn list_records(&self, tenant_id: &str, range: &DateRange) -> Result<Vec<UsageRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, tenant_id, session_id, model, input_tokens, output_tokens,
                   cache_read_tokens, cache_write_tokens, cost_usd, source, ts, usage_date
            FROM usage_record
            WHERE tenant_id = ?1 AND usage_date >= ?2 AND usage_date <= ?3
            ORDER BY ts ASC, id ASC
            "#,
        )?;
        let rows = stmt.query_map(
            params![tenant_id, range.start_key(), range.end_key()],
            row_to_usage_record,
        )?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn count_records(&self, tenant_id: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM usage_record WHERE tenant_id = ?1",
            params![tenant_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Summed cost of the raw records still on disk for a tenant and range.
    pub fn raw_cost_in_range(&self, tenant_id: &str, range: &DateRange) -> Result<f64> {
        let cost: f64 = self.conn.query_row(
            r#"
            SELECT COALESCE(SUM(cost_usd), 0.0)
            FROM usage_record
            WHERE tenant_id = ?1 AND usage_date >= ?2 AND usage_date <= ?3
            "#,
            params![tenant_id, range.start_key(), range.end_key()],
            |row| row.get(0),
        )?;
        Ok(cost)
    }
}
