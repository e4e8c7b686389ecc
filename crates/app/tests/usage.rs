mod support;

use chrono::{Duration, SecondsFormat, Utc};
use ingest::CycleOutcome;
use meter_core::DateRange;
use support::{live_event, setup_app, transcript_turn};

fn minutes_ago(minutes: i64) -> String {
    (Utc::now() - Duration::minutes(minutes)).to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[test]
fn duplicate_live_delivery_is_recorded_once() {
    let app = setup_app();
    let usage = &app.state.services.usage;
    let ts = minutes_ago(5);

    let first = usage
        .record_live_event(live_event("acme", 1_000_000, &ts))
        .expect("first delivery");
    assert!(first.is_some());
    let again = usage
        .record_live_event(live_event("acme", 1_000_000, &ts))
        .expect("second delivery");
    assert_eq!(again, None);

    let db = app.state.open_db().expect("db");
    assert_eq!(db.count_records("acme").expect("count"), 1);
    let total = db.tenant_cost_total("acme").expect("total");
    assert!((total - 3.0).abs() < 1e-9, "total was {total}");
}

#[test]
fn live_event_then_rescan_yields_one_record() {
    let app = setup_app();
    let ts = minutes_ago(10);
    app.state
        .services
        .usage
        .record_live_event(live_event("acme", 500, &ts))
        .expect("live");
    app.write_transcript("acme", "sess-1", &[transcript_turn(&ts, 500)]);

    let outcome = app.state.services.scan.run().expect("scan");
    let CycleOutcome::Completed(stats) = outcome else {
        panic!("scan did not run");
    };
    assert_eq!(stats.records_inserted, 0);
    assert_eq!(stats.duplicates_skipped, 1);
    assert!(!app.state.services.scan.is_running());

    let db = app.state.open_db().expect("db");
    assert_eq!(db.count_records("acme").expect("count"), 1);
}

#[test]
fn aggregates_match_raw_records_after_both_paths() {
    let app = setup_app();
    app.state
        .services
        .usage
        .record_live_event(live_event("acme", 1_000, &minutes_ago(30)))
        .expect("live");
    app.write_transcript(
        "acme",
        "sess-2",
        &[
            transcript_turn(&minutes_ago(20), 2_000),
            transcript_turn(&minutes_ago(10), 3_000),
        ],
    );
    app.state.services.scan.run().expect("scan");

    let range = DateRange::all_time();
    let summary = app
        .state
        .services
        .analytics
        .tenant_summary("acme", &range)
        .expect("summary");
    let raw = app
        .state
        .open_db()
        .expect("db")
        .raw_cost_in_range("acme", &range)
        .expect("raw cost");
    assert_eq!(summary.request_count, 3);
    assert_eq!(summary.input_tokens, 6_000);
    assert!((summary.total_cost_usd - raw).abs() < 1e-9);

    let models = app
        .state
        .services
        .analytics
        .tenant_models("acme", &range)
        .expect("models");
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].model, "claude-sonnet-4-5");
}

#[test]
fn dashboard_ranks_tenants_by_cost() {
    let app = setup_app();
    let usage = &app.state.services.usage;
    usage
        .record_live_event(live_event("small", 1_000, &minutes_ago(3)))
        .expect("small");
    usage
        .record_live_event(live_event("large", 9_000, &minutes_ago(3)))
        .expect("large");

    let rollup = app
        .state
        .services
        .analytics
        .dashboard(&DateRange::all_time())
        .expect("dashboard");
    assert_eq!(rollup.totals.tenant_count, 2);
    let order = rollup
        .top_tenants
        .iter()
        .map(|tenant| tenant.tenant_id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(order, vec!["large", "small"]);
}

#[test]
fn blank_tenant_is_rejected() {
    let app = setup_app();
    let err = app
        .state
        .services
        .analytics
        .tenant_daily(" ", &DateRange::all_time())
        .expect_err("blank tenant");
    assert!(matches!(err, meter_app::AppError::InvalidInput(_)));
}

#[test]
fn forgetting_a_tenant_rescans_without_double_counting() {
    let app = setup_app();
    app.write_transcript("acme", "sess-1", &[transcript_turn(&minutes_ago(15), 700)]);
    app.state.services.scan.run().expect("first scan");

    assert!(app.state.services.scan.forget_tenant("acme").expect("forget"));
    assert!(!app.state.services.scan.forget_tenant("acme").expect("forget again"));

    let outcome = app.state.services.scan.run().expect("second scan");
    let CycleOutcome::Completed(stats) = outcome else {
        panic!("scan did not run");
    };
    assert_eq!(stats.files_scanned, 1);
    assert_eq!(stats.duplicates_skipped, 1);
    assert_eq!(
        app.state.open_db().expect("db").count_records("acme").expect("count"),
        1
    );
}
