mod pricing;
mod quota;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub use pricing::{
    ModelFamily, ModelPriceConfig, PriceTable, PriceTableConfig, PricingError, TokenPrices,
    DEFAULT_PRICE_TABLE_JSON, PRICE_TABLE_VERSION, normalize_model,
};
pub use quota::{QuotaDecision, QuotaReason, TenantQuota, evaluate_quota};

/// Half-width of the window within which two deliveries of the same counts
/// are treated as one event.
pub const DEDUP_WINDOW_SECS: i64 = 5;

const DATE_FORMAT: &str = "%Y-%m-%d";
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// Token counts for one completed turn, split by billing category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default)]
    pub cache_read: u64,
    #[serde(default)]
    pub cache_write_5m: u64,
    #[serde(default)]
    pub cache_write_1h: u64,
}

impl TokenCounts {
    pub fn cache_write(&self) -> u64 {
        self.cache_write_5m.saturating_add(self.cache_write_1h)
    }

    pub fn total(&self) -> u64 {
        self.input
            .saturating_add(self.output)
            .saturating_add(self.cache_read)
            .saturating_add(self.cache_write())
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageSource {
    Live,
    Rescan,
}

impl UsageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Rescan => "rescan",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "live" => Some(Self::Live),
            "rescan" => Some(Self::Rescan),
            _ => None,
        }
    }
}

/// A usage event about to be priced and persisted. Cost is never part of
/// the input; the store derives it from the counts.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUsageRecord {
    pub tenant_id: String,
    pub session_id: Option<String>,
    pub model: String,
    pub tokens: TokenCounts,
    pub source: UsageSource,
    pub ts: DateTime<Utc>,
}

impl NewUsageRecord {
    /// Local calendar date the event is accounted to.
    pub fn usage_date(&self) -> NaiveDate {
        self.ts.with_timezone(&Local).date_naive()
    }

    pub fn ts_string(&self) -> String {
        format_ts(self.ts)
    }

    pub fn dedup_probe(&self) -> DedupProbe {
        DedupProbe {
            tenant_id: self.tenant_id.clone(),
            session_id: self.session_id.clone(),
            model: self.model.clone(),
            tokens: self.tokens,
            ts: self.ts,
        }
    }
}

/// Key used to look for an earlier delivery of the same event.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupProbe {
    pub tenant_id: String,
    pub session_id: Option<String>,
    pub model: String,
    pub tokens: TokenCounts,
    pub ts: DateTime<Utc>,
}

impl DedupProbe {
    pub fn window(&self) -> (String, String) {
        let span = Duration::seconds(DEDUP_WINDOW_SECS);
        (format_ts(self.ts - span), format_ts(self.ts + span))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: i64,
    pub tenant_id: String,
    pub session_id: Option<String>,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub cost_usd: f64,
    pub source: UsageSource,
    pub ts: String,
    pub usage_date: String,
}

/// Additive change applied to one daily aggregate row.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregateDelta {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub cost_usd: f64,
    pub request_count: u64,
    pub session_count: u64,
}

impl AggregateDelta {
    pub fn for_record(tokens: &TokenCounts, cost_usd: f64, session_count: u64) -> Self {
        Self {
            input_tokens: tokens.input,
            output_tokens: tokens.output,
            cache_read_tokens: tokens.cache_read,
            cache_write_tokens: tokens.cache_write(),
            cost_usd,
            request_count: 1,
            session_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub tenant_id: String,
    pub date: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub cost_usd: f64,
    pub request_count: u64,
    pub session_count: u64,
}

/// Inclusive range of local calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    /// Bounded to four-digit years so the text keys keep sorting correctly.
    pub fn all_time() -> Self {
        let start = NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN);
        let end = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX);
        Self::new(start, end)
    }

    /// The `days` calendar days ending with `end`, or `None` when the start
    /// falls outside the supported calendar.
    pub fn last_days(end: NaiveDate, days: u32) -> Option<Self> {
        let span = i64::from(days.max(1)) - 1;
        let start = end.checked_sub_signed(Duration::days(span))?;
        Some(Self::new(start, end))
    }

    pub fn start_key(&self) -> String {
        format_date(self.start)
    }

    pub fn end_key(&self) -> String {
        format_date(self.end)
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantSummary {
    pub tenant_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub request_count: u64,
    pub session_count: u64,
    pub active_days: u64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: String,
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub request_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCost {
    pub model: String,
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub request_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantCost {
    pub tenant_id: String,
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub request_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalTotals {
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub request_count: u64,
    pub session_count: u64,
    pub tenant_count: u64,
}

/// Dashboard rollup across all tenants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalRollup {
    pub range: DateRange,
    pub totals: GlobalTotals,
    pub daily: Vec<DailyPoint>,
    pub models: Vec<ModelCost>,
    pub top_tenants: Vec<TenantCost>,
}

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Accepts four-digit years only; date keys are compared as text.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .ok()
        .filter(|date| (MIN_YEAR..=MAX_YEAR).contains(&date.year()))
}

/// Oldest instant still kept under a retention of `days`, or `None` when
/// the window reaches past the supported calendar.
pub fn retention_cutoff(now: DateTime<Utc>, days: u32) -> Option<DateTime<Utc>> {
    now.checked_sub_signed(Duration::days(i64::from(days)))
}

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Stored form of a model id: trimmed, lowercased, with a trailing
/// `-YYYYMMDD` snapshot suffix removed.
pub fn canonical_model_id(raw: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    match lowered.rsplit_once('-') {
        Some((base, suffix))
            if !base.is_empty()
                && suffix.len() == 8
                && suffix.bytes().all(|byte| byte.is_ascii_digit()) =>
        {
            base.to_string()
        }
        _ => lowered,
    }
}
