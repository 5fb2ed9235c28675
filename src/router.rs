//! Routes free-text questions onto one of seven fixed query templates.
//!
//! Classification is an ordered rule cascade over the lowercased question
//! text: the first predicate that matches selects the template, and only
//! that template's query runs. Rules are substring checks, not exclusive
//! parsing; "what are my top products by channel" routes to top products
//! because that rule is tested before the channel rule.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    aggregate::{SortDirection, TopOptions},
    cleaned::CleanedView,
    value,
};

/// Rows carried by a templated answer table.
pub const TEMPLATE_ROW_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    TopProducts,
    Channels,
    Geo,
    Anomalies,
    MomGrowth,
    YoyGrowth,
    Summary,
}

impl Template {
    pub fn as_str(&self) -> &'static str {
        match self {
            Template::TopProducts => "top_products",
            Template::Channels => "channels",
            Template::Geo => "geo",
            Template::Anomalies => "anomalies",
            Template::MomGrowth => "mom_growth",
            Template::YoyGrowth => "yoy_growth",
            Template::Summary => "summary",
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A routed question: the selected template and its answer table, ready
/// for the downstream text-generation boundary.
#[derive(Debug, Clone, Serialize)]
pub struct RoutedAnswer {
    pub template: Template,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

type Predicate = fn(&str) -> bool;

fn wants_top_products(q: &str) -> bool {
    q.contains("top") && q.contains("product")
}

fn wants_channels(q: &str) -> bool {
    q.contains("channel")
}

fn wants_geo(q: &str) -> bool {
    q.contains("state") || q.contains("city") || q.contains("geo")
}

fn wants_anomalies(q: &str) -> bool {
    q.contains("anomaly") || q.contains("outlier")
}

fn wants_mom(q: &str) -> bool {
    q.contains("mom") || q.contains("month") || q.contains("growth")
}

fn wants_yoy(q: &str) -> bool {
    q.contains("yoy") || q.contains("year")
}

// Checked in order; the first match wins and short-circuits the rest.
// Extend by appending a (predicate, template) pair, not by touching
// call sites.
const ROUTING_RULES: &[(Predicate, Template)] = &[
    (wants_top_products, Template::TopProducts),
    (wants_channels, Template::Channels),
    (wants_geo, Template::Geo),
    (wants_anomalies, Template::Anomalies),
    (wants_mom, Template::MomGrowth),
    (wants_yoy, Template::YoyGrowth),
];

/// Selects the template for a question without running any query.
pub fn classify(question: &str) -> Template {
    let normalized = question.trim().to_ascii_lowercase();
    for (predicate, template) in ROUTING_RULES {
        if predicate(&normalized) {
            return *template;
        }
    }
    Template::Summary
}

/// Classifies the question and executes the selected template's query
/// against the view. Each template runs its own independent query.
pub fn route(view: &CleanedView, question: &str, today: NaiveDate) -> RoutedAnswer {
    match classify(question) {
        Template::TopProducts => top_products_table(view),
        Template::Channels => channels_table(view),
        Template::Geo => geo_table(view),
        Template::Anomalies => anomalies_table(view),
        Template::MomGrowth => mom_growth_table(view),
        Template::YoyGrowth => yoy_growth_table(view),
        Template::Summary => summary_table(view, today),
    }
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn top_products_table(view: &CleanedView) -> RoutedAnswer {
    let options = TopOptions {
        limit: TEMPLATE_ROW_LIMIT,
        offset: 0,
        direction: SortDirection::Desc,
    };
    let rows = view
        .top_products(&options)
        .into_iter()
        .map(|row| {
            vec![
                row.product,
                value::format_amount(row.revenue),
                value::format_quantity(row.quantity),
            ]
        })
        .collect();
    RoutedAnswer {
        template: Template::TopProducts,
        headers: headers(&["product", "revenue", "quantity"]),
        rows,
    }
}

fn channels_table(view: &CleanedView) -> RoutedAnswer {
    let rows = view
        .channel_breakdown()
        .into_iter()
        .take(TEMPLATE_ROW_LIMIT)
        .map(|row| {
            vec![
                row.channel,
                value::format_amount(row.revenue),
                value::format_quantity(row.quantity),
            ]
        })
        .collect();
    RoutedAnswer {
        template: Template::Channels,
        headers: headers(&["channel", "revenue", "quantity"]),
        rows,
    }
}

fn geo_table(view: &CleanedView) -> RoutedAnswer {
    let rows = view
        .geo_breakdown()
        .into_iter()
        .take(TEMPLATE_ROW_LIMIT)
        .map(|row| {
            vec![
                row.state.unwrap_or_default(),
                row.city.unwrap_or_default(),
                value::format_amount(row.revenue),
                value::format_quantity(row.quantity),
            ]
        })
        .collect();
    RoutedAnswer {
        template: Template::Geo,
        headers: headers(&["state", "city", "revenue", "quantity"]),
        rows,
    }
}

fn anomalies_table(view: &CleanedView) -> RoutedAnswer {
    // Top days by |z| regardless of the dashboard's anomaly threshold.
    let rows = view
        .daily_zscores()
        .into_iter()
        .take(TEMPLATE_ROW_LIMIT)
        .map(|anomaly| {
            vec![
                anomaly.day.format("%Y-%m-%d").to_string(),
                value::format_amount(anomaly.revenue),
                format!("{:.2}", anomaly.zscore),
            ]
        })
        .collect();
    RoutedAnswer {
        template: Template::Anomalies,
        headers: headers(&["day", "revenue", "zscore"]),
        rows,
    }
}

fn mom_growth_table(view: &CleanedView) -> RoutedAnswer {
    let mut months = view.monthly_series();
    months.reverse();
    let rows = months
        .into_iter()
        .take(2)
        .map(|point| {
            vec![
                point.bucket.format("%Y-%m").to_string(),
                value::format_amount(point.revenue),
            ]
        })
        .collect();
    RoutedAnswer {
        template: Template::MomGrowth,
        headers: headers(&["month", "revenue"]),
        rows,
    }
}

fn yoy_growth_table(view: &CleanedView) -> RoutedAnswer {
    let mut years = view.yearly_revenue();
    years.reverse();
    let rows = years
        .into_iter()
        .take(2)
        .map(|(year, revenue)| vec![year.to_string(), value::format_amount(revenue)])
        .collect();
    RoutedAnswer {
        template: Template::YoyGrowth,
        headers: headers(&["year", "revenue"]),
        rows,
    }
}

fn summary_table(view: &CleanedView, today: NaiveDate) -> RoutedAnswer {
    let headers = headers(&[
        "total_revenue",
        "total_quantity",
        "rows",
        "min_date",
        "max_date",
        "mom_growth",
        "yoy_growth",
    ]);
    let rows = if view.is_empty() {
        Vec::new()
    } else {
        let summary = view.summary_at(today);
        vec![vec![
            value::format_amount(summary.total_revenue),
            value::format_quantity(summary.total_quantity),
            summary.row_count.to_string(),
            summary
                .min_date
                .map(|ts| value::format_timestamp(&ts))
                .unwrap_or_default(),
            summary
                .max_date
                .map(|ts| value::format_timestamp(&ts))
                .unwrap_or_default(),
            value::format_ratio(summary.mom_growth_pct),
            value::format_ratio(summary.yoy_growth_pct),
        ]]
    };
    RoutedAnswer {
        template: Template::Summary,
        headers,
        rows,
    }
}
