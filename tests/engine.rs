mod common;

use chrono::NaiveDate;
use encoding_rs::UTF_8;

use common::{ORDERS_CSV, SPIKE_CSV, TestWorkspace};
use saleslens::aggregate::TopOptions;
use saleslens::cleaned::CleanedView;
use saleslens::ingest;
use saleslens::schema::SchemaInference;

fn load_view(csv: &str) -> CleanedView {
    let workspace = TestWorkspace::new();
    let input = workspace.write("data.csv", csv);
    let raw = ingest::load_table(&input, b',', UTF_8, 0).expect("load table");
    let inference = SchemaInference::from_table(&raw);
    let (mapping, _) = inference.column_map();
    CleanedView::materialize(&raw, &mapping)
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[test]
fn end_to_end_pipeline_derives_revenue_and_aggregates() {
    let view = load_view(ORDERS_CSV);
    assert_eq!(view.len(), 4);

    let summary = view.summary_at(day(2024, 2, 15));
    assert_eq!(summary.total_revenue, 50.0);
    assert_eq!(summary.total_quantity, 7.0);
    assert!(summary.has_date);

    let top = view.top_products(&TopOptions::default());
    assert_eq!(top[0].product, "widget");
    assert_eq!(top[0].revenue, 30.0);
    assert_eq!(top[1].product, "gadget");

    let geo = view.geo_breakdown();
    assert_eq!(geo.len(), 3);
    assert_eq!(geo[0].state.as_deref(), Some("WA"));
    assert_eq!(geo[0].city.as_deref(), Some("Seattle"));

    let channels = view.channel_breakdown();
    assert_eq!(channels.len(), 2);
    assert_eq!(channels[0].channel, "web");
    assert_eq!(channels[0].revenue, 30.0);
}

#[test]
fn repeated_materialization_yields_identical_aggregates() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);
    let raw = ingest::load_table(&input, b',', UTF_8, 0).expect("load table");
    let inference = SchemaInference::from_table(&raw);
    let (mapping, _) = inference.column_map();

    let first = CleanedView::materialize(&raw, &mapping);
    let second = CleanedView::materialize(&raw, &mapping);

    let anchor = day(2024, 2, 15);
    assert_eq!(first.summary_at(anchor), second.summary_at(anchor));
    assert_eq!(first.daily_series(), second.daily_series());
    assert_eq!(first.monthly_series(), second.monthly_series());
    assert_eq!(
        first.top_products(&TopOptions::default()),
        second.top_products(&TopOptions::default())
    );
    assert_eq!(first.anomalies(), second.anomalies());
}

#[test]
fn spike_day_is_anomalous_with_positive_zscore() {
    let view = load_view(SPIKE_CSV);
    let anomalies = view.anomalies();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].day, day(2024, 1, 5));
    assert!(anomalies[0].zscore > 0.0);
}

#[test]
fn day_and_month_buckets_match_the_contract() {
    let view = load_view(
        "product,revenue,created_at\n\
         a,1,2024-01-01\n\
         a,2,2024-01-01\n\
         a,3,2024-02-01\n",
    );
    assert_eq!(view.daily_series().len(), 2);
    assert_eq!(view.monthly_series().len(), 2);
    assert_eq!(view.daily_series()[0].revenue, 3.0);
}

#[test]
fn row_cap_limits_ingest() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);
    let raw = ingest::load_table(&input, b',', UTF_8, 2).expect("load table");
    assert_eq!(raw.row_count(), 2);
}

#[test]
fn meta_round_trip_tracks_content_identity() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", ORDERS_CSV);
    let meta_path = workspace.path().join("orders-meta.yml");

    let raw = ingest::load_table(&input, b',', UTF_8, 0).expect("load table");
    let inference = SchemaInference::from_table(&raw);
    inference.save(&meta_path).expect("save meta");

    let loaded = SchemaInference::load(&meta_path).expect("load meta");
    assert!(loaded.matches_content(&raw));

    let other = workspace.write("spike.csv", SPIKE_CSV);
    let other_raw = ingest::load_table(&other, b',', UTF_8, 0).expect("load other");
    assert!(!loaded.matches_content(&other_raw));
}

#[test]
fn empty_file_summary_is_well_defined() {
    let view = load_view("product,revenue,created_at\n");
    let summary = view.summary_at(day(2024, 6, 1));
    assert_eq!(summary.total_revenue, 0.0);
    assert!(!summary.has_date);
    assert_eq!(summary.mom_growth_pct, None);
    assert_eq!(summary.yoy_growth_pct, None);
    assert!(view.daily_series().is_empty());
    assert!(view.anomalies().is_empty());
}
