//! The aggregation engine: deterministic read-only computations over the
//! cleaned relation.
//!
//! Every aggregate here is a pure function of the view's current contents
//! at call time, with no caching and no shared state. All of them
//! tolerate an empty or all-null relation by returning empty or zero
//! results.
//!
//! Growth metrics compare calendar buckets relative to a supplied anchor
//! date. The public [`CleanedView::summary`] anchors at the wall clock,
//! which is surprising for historical datasets but preserved for
//! compatibility; [`CleanedView::summary_at`] is the seam where a
//! data-anchored variant would plug in.

use std::collections::BTreeMap;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use itertools::Itertools;
use serde::Serialize;

use crate::cleaned::CleanedView;

pub const DEFAULT_TOP_LIMIT: usize = 10;
pub const ANOMALY_Z_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Paging and ordering for the top-products query.
#[derive(Debug, Clone)]
pub struct TopOptions {
    /// Maximum rows returned; 0 means unlimited.
    pub limit: usize,
    pub offset: usize,
    pub direction: SortDirection,
}

impl Default for TopOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_TOP_LIMIT,
            offset: 0,
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_revenue: f64,
    pub total_quantity: f64,
    pub row_count: usize,
    pub has_date: bool,
    pub min_date: Option<NaiveDateTime>,
    pub max_date: Option<NaiveDateTime>,
    pub mom_growth_pct: Option<f64>,
    pub yoy_growth_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub bucket: NaiveDate,
    pub revenue: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRow {
    pub product: String,
    pub revenue: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoRow {
    pub state: Option<String>,
    pub city: Option<String>,
    pub revenue: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelRow {
    pub channel: String,
    pub revenue: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAnomaly {
    pub day: NaiveDate,
    pub revenue: f64,
    pub zscore: f64,
}

impl CleanedView {
    /// Summary totals and growth anchored to today's wall-clock date.
    pub fn summary(&self) -> Summary {
        self.summary_at(Local::now().date_naive())
    }

    /// Summary totals with growth buckets anchored to `today`. Totals
    /// ignore null cells; an empty view yields zero totals, `has_date`
    /// false, and both growth rates absent.
    pub fn summary_at(&self, today: NaiveDate) -> Summary {
        let total_revenue = self.rows().iter().filter_map(|row| row.revenue).sum();
        let total_quantity = self.rows().iter().filter_map(|row| row.quantity).sum();
        let min_date = self.rows().iter().filter_map(|row| row.ts).min();
        let max_date = self.rows().iter().filter_map(|row| row.ts).max();
        let has_date = min_date.is_some();

        let (mom_growth_pct, yoy_growth_pct) = if has_date {
            let daily = self.daily_revenue();
            (
                month_over_month(&daily, today),
                year_over_year(&daily, today),
            )
        } else {
            (None, None)
        };

        Summary {
            total_revenue,
            total_quantity,
            row_count: self.len(),
            has_date,
            min_date,
            max_date,
            mom_growth_pct,
            yoy_growth_pct,
        }
    }

    /// Revenue and quantity summed per day over non-null timestamps,
    /// ascending.
    pub fn daily_series(&self) -> Vec<SeriesPoint> {
        self.series_by(|date| date)
    }

    /// Revenue and quantity summed per calendar month, ascending. Buckets
    /// are represented by the first day of the month.
    pub fn monthly_series(&self) -> Vec<SeriesPoint> {
        self.series_by(month_start)
    }

    fn series_by(&self, bucket_fn: impl Fn(NaiveDate) -> NaiveDate) -> Vec<SeriesPoint> {
        let mut buckets: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
        for row in self.rows() {
            let Some(ts) = row.ts else { continue };
            let entry = buckets.entry(bucket_fn(ts.date())).or_insert((0.0, 0.0));
            entry.0 += row.revenue.unwrap_or(0.0);
            entry.1 += row.quantity.unwrap_or(0.0);
        }
        buckets
            .into_iter()
            .map(|(bucket, (revenue, quantity))| SeriesPoint {
                bucket,
                revenue,
                quantity,
            })
            .collect()
    }

    /// Products ranked by revenue. Rows with a null product are excluded.
    pub fn top_products(&self, options: &TopOptions) -> Vec<ProductRow> {
        let mut totals: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        for row in self.rows() {
            let Some(product) = row.product.as_deref() else {
                continue;
            };
            let entry = totals.entry(product.to_string()).or_insert((0.0, 0.0));
            entry.0 += row.revenue.unwrap_or(0.0);
            entry.1 += row.quantity.unwrap_or(0.0);
        }
        let limit = if options.limit == 0 {
            usize::MAX
        } else {
            options.limit
        };
        totals
            .into_iter()
            .map(|(product, (revenue, quantity))| ProductRow {
                product,
                revenue,
                quantity,
            })
            .sorted_by(|a, b| match options.direction {
                SortDirection::Desc => b
                    .revenue
                    .total_cmp(&a.revenue)
                    .then_with(|| a.product.cmp(&b.product)),
                SortDirection::Asc => a
                    .revenue
                    .total_cmp(&b.revenue)
                    .then_with(|| a.product.cmp(&b.product)),
            })
            .skip(options.offset)
            .take(limit)
            .collect()
    }

    /// Revenue by (state, city) pair, descending. A row participates when
    /// either component is non-null. No limit.
    pub fn geo_breakdown(&self) -> Vec<GeoRow> {
        let mut totals: BTreeMap<(Option<String>, Option<String>), (f64, f64)> = BTreeMap::new();
        for row in self.rows() {
            if row.state.is_none() && row.city.is_none() {
                continue;
            }
            let key = (row.state.clone(), row.city.clone());
            let entry = totals.entry(key).or_insert((0.0, 0.0));
            entry.0 += row.revenue.unwrap_or(0.0);
            entry.1 += row.quantity.unwrap_or(0.0);
        }
        totals
            .into_iter()
            .map(|((state, city), (revenue, quantity))| GeoRow {
                state,
                city,
                revenue,
                quantity,
            })
            .sorted_by(|a, b| {
                b.revenue
                    .total_cmp(&a.revenue)
                    .then_with(|| a.state.cmp(&b.state))
                    .then_with(|| a.city.cmp(&b.city))
            })
            .collect()
    }

    /// Revenue by channel, descending, excluding null channels. No limit.
    pub fn channel_breakdown(&self) -> Vec<ChannelRow> {
        let mut totals: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        for row in self.rows() {
            let Some(channel) = row.channel.as_deref() else {
                continue;
            };
            let entry = totals.entry(channel.to_string()).or_insert((0.0, 0.0));
            entry.0 += row.revenue.unwrap_or(0.0);
            entry.1 += row.quantity.unwrap_or(0.0);
        }
        totals
            .into_iter()
            .map(|(channel, (revenue, quantity))| ChannelRow {
                channel,
                revenue,
                quantity,
            })
            .sorted_by(|a, b| {
                b.revenue
                    .total_cmp(&a.revenue)
                    .then_with(|| a.channel.cmp(&b.channel))
            })
            .collect()
    }

    /// Days whose revenue deviates at least [`ANOMALY_Z_THRESHOLD`]
    /// standard deviations from the daily mean, ordered by |z|
    /// descending.
    pub fn anomalies(&self) -> Vec<DailyAnomaly> {
        self.daily_zscores()
            .into_iter()
            .filter(|anomaly| anomaly.zscore.abs() >= ANOMALY_Z_THRESHOLD)
            .collect()
    }

    /// Every day scored by |z| descending, with no threshold applied.
    /// Empty when fewer than two distinct days exist or the daily totals
    /// have zero variance.
    pub fn daily_zscores(&self) -> Vec<DailyAnomaly> {
        let daily = self.daily_revenue();
        if daily.len() < 2 {
            return Vec::new();
        }
        let count = daily.len() as f64;
        let mean = daily.values().sum::<f64>() / count;
        let variance = daily.values().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count;
        let stddev = variance.max(0.0).sqrt();
        if stddev == 0.0 || !stddev.is_finite() {
            return Vec::new();
        }
        daily
            .into_iter()
            .map(|(day, revenue)| DailyAnomaly {
                day,
                revenue,
                zscore: (revenue - mean) / stddev,
            })
            .sorted_by(|a, b| {
                b.zscore
                    .abs()
                    .total_cmp(&a.zscore.abs())
                    .then_with(|| a.day.cmp(&b.day))
            })
            .collect()
    }

    /// Revenue summed per calendar year, ascending. Days with only null
    /// revenue contribute nothing.
    pub fn yearly_revenue(&self) -> Vec<(i32, f64)> {
        let mut totals: BTreeMap<i32, f64> = BTreeMap::new();
        for row in self.rows() {
            if let (Some(ts), Some(revenue)) = (row.ts, row.revenue) {
                *totals.entry(ts.date().year()).or_insert(0.0) += revenue;
            }
        }
        totals.into_iter().collect()
    }

    /// Revenue summed per day, keyed by date. Rows with a null timestamp
    /// or null revenue are excluded; growth and anomaly detection both
    /// re-aggregate from this map.
    fn daily_revenue(&self) -> BTreeMap<NaiveDate, f64> {
        let mut totals = BTreeMap::new();
        for row in self.rows() {
            if let (Some(ts), Some(revenue)) = (row.ts, row.revenue) {
                *totals.entry(ts.date()).or_insert(0.0) += revenue;
            }
        }
        totals
    }
}

fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).expect("first of month is valid")
}

fn previous_month(month: NaiveDate) -> NaiveDate {
    if month.month() == 1 {
        NaiveDate::from_ymd_opt(month.year() - 1, 12, 1).expect("first of month is valid")
    } else {
        NaiveDate::from_ymd_opt(month.year(), month.month() - 1, 1)
            .expect("first of month is valid")
    }
}

fn month_over_month(daily: &BTreeMap<NaiveDate, f64>, today: NaiveDate) -> Option<f64> {
    let this_month = month_start(today);
    let prev_month = previous_month(this_month);
    let current = bucket_total(daily, |day| month_start(*day) == this_month);
    let previous = bucket_total(daily, |day| month_start(*day) == prev_month);
    growth_between(current, previous)
}

fn year_over_year(daily: &BTreeMap<NaiveDate, f64>, today: NaiveDate) -> Option<f64> {
    let current = bucket_total(daily, |day| day.year() == today.year());
    let previous = bucket_total(daily, |day| day.year() == today.year() - 1);
    growth_between(current, previous)
}

/// Sums the daily totals that fall inside a bucket; `None` when the
/// bucket contains no days at all.
fn bucket_total(
    daily: &BTreeMap<NaiveDate, f64>,
    in_bucket: impl Fn(&NaiveDate) -> bool,
) -> Option<f64> {
    let mut total = None;
    for (day, revenue) in daily {
        if in_bucket(day) {
            *total.get_or_insert(0.0) += revenue;
        }
    }
    total
}

/// `(current - previous) / previous`; `None` when the prior bucket is
/// zero or absent. A current bucket with no data counts as zero.
fn growth_between(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    let current = current.unwrap_or(0.0);
    let previous = previous?;
    if previous == 0.0 {
        None
    } else {
        Some((current - previous) / previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ingest::RawTable,
        mapper::{self},
    };

    fn view(columns: &[&str], rows: &[&[&str]]) -> CleanedView {
        let table = RawTable::from_rows(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
        .expect("fixture table");
        let inferences: Vec<_> = table.columns().iter().map(|c| mapper::infer(c)).collect();
        let (mapping, _) = mapper::build_column_map(&inferences);
        CleanedView::materialize(&table, &mapping)
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn empty_view_summary_is_zeroed_not_nan() {
        let view = view(&["product", "revenue", "created_at"], &[]);
        let summary = view.summary_at(day(2024, 6, 1));
        assert_eq!(summary.total_revenue, 0.0);
        assert_eq!(summary.total_quantity, 0.0);
        assert!(!summary.has_date);
        assert_eq!(summary.min_date, None);
        assert_eq!(summary.mom_growth_pct, None);
        assert_eq!(summary.yoy_growth_pct, None);
    }

    #[test]
    fn summary_sums_ignore_null_cells() {
        let view = view(
            &["product", "revenue", "qty", "created_at"],
            &[
                &["a", "10.0", "1", "2024-01-01"],
                &["b", "junk", "2", "2024-01-02"],
                &["c", "5.0", "", "bad date"],
            ],
        );
        let summary = view.summary_at(day(2024, 6, 1));
        assert_eq!(summary.total_revenue, 15.0);
        assert_eq!(summary.total_quantity, 3.0);
        assert!(summary.has_date);
        assert_eq!(summary.row_count, 3);
    }

    #[test]
    fn growth_is_anchored_to_the_supplied_date() {
        let view = view(
            &["product", "revenue", "created_at"],
            &[
                &["a", "100.0", "2024-01-10"],
                &["a", "150.0", "2024-02-10"],
                &["a", "80.0", "2023-03-01"],
            ],
        );
        let summary = view.summary_at(day(2024, 2, 20));
        // Feb vs Jan: (150 - 100) / 100
        assert_eq!(summary.mom_growth_pct, Some(0.5));
        // 2024 vs 2023: (250 - 80) / 80
        let yoy = summary.yoy_growth_pct.expect("prior year present");
        assert!((yoy - (250.0 - 80.0) / 80.0).abs() < 1e-9);
    }

    #[test]
    fn growth_is_null_when_the_prior_bucket_is_missing_or_zero() {
        let view = view(
            &["product", "revenue", "created_at"],
            &[&["a", "100.0", "2024-02-10"]],
        );
        let summary = view.summary_at(day(2024, 2, 20));
        assert_eq!(summary.mom_growth_pct, None);
        assert_eq!(summary.yoy_growth_pct, None);
    }

    #[test]
    fn series_buckets_by_day_and_month() {
        let view = view(
            &["product", "revenue", "created_at"],
            &[
                &["a", "10.0", "2024-01-01"],
                &["a", "20.0", "2024-01-01"],
                &["a", "5.0", "2024-02-01"],
            ],
        );
        let daily = view.daily_series();
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].bucket, day(2024, 1, 1));
        assert_eq!(daily[0].revenue, 30.0);
        assert_eq!(daily[1].revenue, 5.0);

        let monthly = view.monthly_series();
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[0].bucket, day(2024, 1, 1));
        assert_eq!(monthly[1].bucket, day(2024, 2, 1));
    }

    #[test]
    fn top_products_orders_pages_and_excludes_null_products() {
        let view = view(
            &["product", "revenue"],
            &[
                &["alpha", "10.0"],
                &["beta", "30.0"],
                &["gamma", "20.0"],
                &["", "99.0"],
            ],
        );
        let top = view.top_products(&TopOptions::default());
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].product, "beta");
        assert_eq!(top[2].product, "alpha");

        let paged = view.top_products(&TopOptions {
            limit: 1,
            offset: 1,
            direction: SortDirection::Desc,
        });
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].product, "gamma");

        let ascending = view.top_products(&TopOptions {
            limit: 0,
            offset: 0,
            direction: SortDirection::Asc,
        });
        assert_eq!(ascending[0].product, "alpha");
    }

    #[test]
    fn geo_rows_need_only_one_component() {
        let view = view(
            &["product", "revenue", "state", "city"],
            &[
                &["a", "10.0", "WA", "Seattle"],
                &["a", "20.0", "WA", ""],
                &["a", "30.0", "", ""],
            ],
        );
        let geo = view.geo_breakdown();
        assert_eq!(geo.len(), 2);
        assert_eq!(geo[0].state.as_deref(), Some("WA"));
        assert_eq!(geo[0].city, None);
        assert_eq!(geo[0].revenue, 20.0);
    }

    #[test]
    fn anomaly_spike_day_scores_positive() {
        let view = view(
            &["product", "revenue", "created_at"],
            &[
                &["a", "100.0", "2024-01-01"],
                &["a", "100.0", "2024-01-02"],
                &["a", "100.0", "2024-01-03"],
                &["a", "100.0", "2024-01-04"],
                &["a", "1000.0", "2024-01-05"],
            ],
        );
        let anomalies = view.anomalies();
        assert!(!anomalies.is_empty());
        assert_eq!(anomalies[0].day, day(2024, 1, 5));
        assert!(anomalies[0].zscore > 0.0);
    }

    #[test]
    fn zero_variance_yields_no_anomalies() {
        let view = view(
            &["product", "revenue", "created_at"],
            &[
                &["a", "100.0", "2024-01-01"],
                &["a", "100.0", "2024-01-02"],
                &["a", "100.0", "2024-01-03"],
            ],
        );
        assert!(view.anomalies().is_empty());
        assert!(view.daily_zscores().is_empty());
    }

    #[test]
    fn single_day_yields_no_anomalies() {
        let view = view(
            &["product", "revenue", "created_at"],
            &[&["a", "100.0", "2024-01-01"]],
        );
        assert!(view.anomalies().is_empty());
    }

    #[test]
    fn yearly_revenue_sums_ascending() {
        let view = view(
            &["product", "revenue", "created_at"],
            &[
                &["a", "10.0", "2023-05-01"],
                &["a", "20.0", "2024-05-01"],
                &["a", "30.0", "2024-06-01"],
            ],
        );
        assert_eq!(view.yearly_revenue(), vec![(2023, 10.0), (2024, 50.0)]);
    }
}
