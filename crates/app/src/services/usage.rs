use std::sync::Arc;

use chrono::{DateTime, Utc};
use meter_core::{NewUsageRecord, PriceTable, TokenCounts, UsageSource, canonical_model_id};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::services::{SharedConfig, open_db, require_tenant};

/// Usage reported by the live event stream for one completed turn.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LiveUsageEvent {
    pub tenant_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub model: String,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
    /// Unsplit cache-write count, billed at the 5-minute rate.
    #[serde(default)]
    pub cache_write_tokens: Option<u64>,
    #[serde(default)]
    pub cache_write_5m_tokens: Option<u64>,
    #[serde(default)]
    pub cache_write_1h_tokens: Option<u64>,
    /// RFC 3339 event time; receipt time when absent.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl LiveUsageEvent {
    fn tokens(&self) -> TokenCounts {
        let split = self.cache_write_5m_tokens.is_some() || self.cache_write_1h_tokens.is_some();
        let (cache_write_5m, cache_write_1h) = if split {
            (
                self.cache_write_5m_tokens.unwrap_or(0),
                self.cache_write_1h_tokens.unwrap_or(0),
            )
        } else {
            (self.cache_write_tokens.unwrap_or(0), 0)
        };
        TokenCounts {
            input: self.input_tokens,
            output: self.output_tokens,
            cache_read: self.cache_read_tokens,
            cache_write_5m,
            cache_write_1h,
        }
    }

    fn event_time(&self) -> Result<DateTime<Utc>> {
        match self.timestamp.as_deref().map(str::trim) {
            None | Some("") => Ok(Utc::now()),
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|parsed| parsed.with_timezone(&Utc))
                .map_err(|err| AppError::InvalidInput(format!("invalid timestamp: {err}"))),
        }
    }

    fn into_record(self) -> Result<NewUsageRecord> {
        let tenant_id = require_tenant(&self.tenant_id)?.to_string();
        let model = canonical_model_id(&self.model);
        if model.is_empty() {
            return Err(AppError::InvalidInput("model is required".to_string()));
        }
        let session_id = self
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|session| !session.is_empty())
            .map(str::to_string);
        Ok(NewUsageRecord {
            tenant_id,
            session_id,
            model,
            tokens: self.tokens(),
            source: UsageSource::Live,
            ts: self.event_time()?,
        })
    }
}

#[derive(Clone)]
pub struct UsageService {
    config: SharedConfig,
    pricing: Arc<PriceTable>,
}

impl UsageService {
    pub(super) fn new(config: SharedConfig, pricing: Arc<PriceTable>) -> Self {
        Self { config, pricing }
    }

    /// Prices and stores a live event. Returns the new record id, or `None`
    /// when the same turn is already on record.
    pub fn record_live_event(&self, event: LiveUsageEvent) -> Result<Option<i64>> {
        let record = event.into_record()?;
        let mut db = open_db(&self.config)?;
        if db.record_exists(&record.dedup_probe())? {
            debug!(
                tenant = %record.tenant_id,
                model = %record.model,
                "duplicate live event ignored"
            );
            return Ok(None);
        }
        let cost = self.pricing.cost_usd(&record.model, &record.tokens);
        let id = db.commit_record(&record, cost, 0)?;
        info!(
            tenant = %record.tenant_id,
            model = %record.model,
            tokens = record.tokens.total(),
            cost_usd = cost,
            "live usage recorded"
        );
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> LiveUsageEvent {
        LiveUsageEvent {
            tenant_id: "acme".to_string(),
            model: "claude-opus-4-1".to_string(),
            input_tokens: 10,
            ..LiveUsageEvent::default()
        }
    }

    #[test]
    fn unsplit_cache_writes_are_five_minute() {
        let tokens = LiveUsageEvent {
            cache_write_tokens: Some(40),
            ..event()
        }
        .tokens();
        assert_eq!(tokens.cache_write_5m, 40);
        assert_eq!(tokens.cache_write_1h, 0);
    }

    #[test]
    fn split_cache_writes_win_over_legacy_count() {
        let tokens = LiveUsageEvent {
            cache_write_tokens: Some(40),
            cache_write_1h_tokens: Some(30),
            ..event()
        }
        .tokens();
        assert_eq!(tokens.cache_write_5m, 0);
        assert_eq!(tokens.cache_write_1h, 30);
    }

    #[test]
    fn rejects_missing_tenant_or_model() {
        let missing_tenant = LiveUsageEvent {
            tenant_id: "  ".to_string(),
            ..event()
        };
        assert!(matches!(
            missing_tenant.into_record(),
            Err(AppError::InvalidInput(_))
        ));
        let missing_model = LiveUsageEvent {
            model: String::new(),
            ..event()
        };
        assert!(matches!(
            missing_model.into_record(),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_unparsable_timestamp() {
        let bad = LiveUsageEvent {
            timestamp: Some("last tuesday".to_string()),
            ..event()
        };
        assert!(matches!(bad.into_record(), Err(AppError::InvalidInput(_))));
    }
}
