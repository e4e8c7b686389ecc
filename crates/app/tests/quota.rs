mod support;

use chrono::{Duration, SecondsFormat, Utc};
use meter_app::{AppState, QuotaUpdate};
use meter_core::{PriceTable, QuotaReason};
use support::{config_in, live_event, setup_app};

fn at(minutes_ago: i64) -> String {
    (Utc::now() - Duration::minutes(minutes_ago)).to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn quota(tenant_id: &str, total: Option<f64>, daily: Option<f64>) -> QuotaUpdate {
    QuotaUpdate {
        tenant_id: tenant_id.to_string(),
        total_limit_usd: total,
        daily_limit_usd: daily,
    }
}

#[test]
fn tenant_without_quota_is_allowed() {
    let app = setup_app();
    let decision = app.state.services.quota.evaluate("acme").expect("evaluate");
    assert!(decision.allowed);
    assert_eq!(decision.reason, None);
}

#[test]
fn spend_equal_to_total_ceiling_blocks() {
    let app = setup_app();
    let services = &app.state.services;
    services
        .quota
        .set(quota("acme", Some(3.0), None))
        .expect("set quota");
    // One million sonnet input tokens cost exactly 3 USD.
    services
        .usage
        .record_live_event(live_event("acme", 1_000_000, &at(1)))
        .expect("live");

    let decision = services.quota.evaluate("acme").expect("evaluate");
    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(QuotaReason::TotalLimitExceeded));
    assert_eq!(decision.limit, Some(3.0));
}

#[test]
fn daily_ceiling_is_checked_after_total() {
    let app = setup_app();
    let services = &app.state.services;
    services
        .quota
        .set(quota("acme", Some(100.0), Some(1.0)))
        .expect("set quota");
    services
        .usage
        .record_live_event(live_event("acme", 500_000, &at(0)))
        .expect("live");

    let decision = services.quota.evaluate("acme").expect("evaluate");
    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(QuotaReason::DailyLimitExceeded));
    let current = decision.current.expect("current spend");
    assert!((current - 1.5).abs() < 1e-9);
}

#[test]
fn spend_below_ceilings_is_allowed() {
    let app = setup_app();
    let services = &app.state.services;
    services
        .quota
        .set(quota("acme", Some(10.0), Some(5.0)))
        .expect("set quota");
    services
        .usage
        .record_live_event(live_event("acme", 100_000, &at(1)))
        .expect("live");
    assert!(services.quota.evaluate("acme").expect("evaluate").allowed);
}

#[test]
fn negative_ceiling_is_rejected() {
    let app = setup_app();
    let err = app
        .state
        .services
        .quota
        .set(quota("acme", Some(-1.0), None))
        .expect_err("negative limit");
    assert!(matches!(err, meter_app::AppError::InvalidInput(_)));
    assert_eq!(app.state.services.quota.get("acme").expect("get"), None);
}

#[test]
fn check_or_allow_fails_open_when_store_is_unreadable() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = config_in(dir.path());
    // A directory where the database file should be makes every open fail.
    std::fs::create_dir_all(&config.db_path).expect("block db path");
    config.state_dir = dir.path().join("state");
    let state = AppState::new(config, PriceTable::bundled().expect("prices"));

    assert!(state.services.quota.evaluate("acme").is_err());
    let decision = state.services.quota.check_or_allow("acme");
    assert!(decision.allowed);
}
