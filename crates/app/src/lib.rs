pub mod app;
pub mod config;
pub mod error;
pub mod pricing;
pub mod services;
pub mod util;

pub use app::{AppConfig, AppState};
pub use config::{ConfigLoad, LogFormat, MeterConfig, RangeParams, load_or_create};
pub use error::{ApiError, AppError, Result};
pub use pricing::load_price_table;
pub use services::{AppServices, LiveUsageEvent, QuotaUpdate};
pub use util::time::resolve_date_range;
