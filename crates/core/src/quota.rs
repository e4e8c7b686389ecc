use serde::{Deserialize, Serialize};

/// Spend within this distance of a ceiling counts as reaching it, so float
/// summation noise cannot let a tenant slip past an exact limit.
const CEILING_TOLERANCE_USD: f64 = 1e-9;

/// Administrator-set spending ceilings for one tenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantQuota {
    pub tenant_id: String,
    pub total_limit_usd: Option<f64>,
    pub daily_limit_usd: Option<f64>,
}

impl TenantQuota {
    pub fn has_limits(&self) -> bool {
        self.total_limit_usd.is_some() || self.daily_limit_usd.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaReason {
    TotalLimitExceeded,
    DailyLimitExceeded,
}

impl QuotaReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TotalLimitExceeded => "total_limit_exceeded",
            Self::DailyLimitExceeded => "daily_limit_exceeded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<QuotaReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<f64>,
}

impl QuotaDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            limit: None,
            current: None,
        }
    }

    fn block(reason: QuotaReason, limit: f64, current: f64) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            limit: Some(limit),
            current: Some(current),
        }
    }
}

fn reached(current: f64, limit: f64) -> bool {
    current + CEILING_TOLERANCE_USD >= limit
}

/// Decides whether a tenant may keep spending. The total ceiling is checked
/// before the daily one; reaching a ceiling blocks.
pub fn evaluate_quota(quota: &TenantQuota, total_usd: f64, today_usd: f64) -> QuotaDecision {
    if let Some(limit) = quota.total_limit_usd
        && reached(total_usd, limit)
    {
        return QuotaDecision::block(QuotaReason::TotalLimitExceeded, limit, total_usd);
    }
    if let Some(limit) = quota.daily_limit_usd
        && reached(today_usd, limit)
    {
        return QuotaDecision::block(QuotaReason::DailyLimitExceeded, limit, today_usd);
    }
    QuotaDecision::allow()
}
