use meter_app::RangeParams;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct RangeRequest {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl RangeRequest {
    pub fn params(&self) -> RangeParams {
        RangeParams {
            start: self.start.clone(),
            end: self.end.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TenantRangeRequest {
    pub tenant_id: String,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl TenantRangeRequest {
    pub fn params(&self) -> RangeParams {
        RangeParams {
            start: self.start.clone(),
            end: self.end.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TenantRequest {
    pub tenant_id: String,
}

#[derive(Debug, Deserialize)]
pub struct EmptyRequest {}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsageEventResponse {
    pub recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}
