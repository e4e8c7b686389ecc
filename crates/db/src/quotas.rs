use chrono::Utc;
use meter_core::{TenantQuota, format_ts};
use rusqlite::{OptionalExtension, params};

use crate::Db;
use crate::error::Result;

impl Db {
    pub fn get_tenant_quota(&self, tenant_id: &str) -> Result<Option<TenantQuota>> {
        let quota = self
            .conn
            .query_row(
                r#"
                SELECT tenant_id, total_limit_usd, daily_limit_usd
                FROM tenant_quota
                WHERE tenant_id = ?1
                "#,
                params![tenant_id],
                |row| {
                    Ok(TenantQuota {
                        tenant_id: row.get(0)?,
                        total_limit_usd: row.get(1)?,
                        daily_limit_usd: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(quota)
    }

    /// Administrative write; the metering paths only read quotas.
    pub fn set_tenant_quota(&self, quota: &TenantQuota) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO tenant_quota (tenant_id, total_limit_usd, daily_limit_usd, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(tenant_id) DO UPDATE SET
              total_limit_usd = excluded.total_limit_usd,
              daily_limit_usd = excluded.daily_limit_usd,
              updated_at = excluded.updated_at
            "#,
            params![
                quota.tenant_id,
                quota.total_limit_usd,
                quota.daily_limit_usd,
                format_ts(Utc::now()),
            ],
        )?;
        Ok(())
    }
}
