//! The flattened aggregate bundle handed to the external insights prompt.
//!
//! Each category is capped at [`CATEGORY_ROW_LIMIT`] rows before
//! serialization so the downstream prompt stays small. Building the bundle
//! with no revenue signal is an explicit insufficient-context condition,
//! not an empty success.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    aggregate::{ChannelRow, DailyAnomaly, GeoRow, ProductRow, SeriesPoint, SortDirection, Summary, TopOptions},
    cleaned::CleanedView,
    error::EngineError,
};

pub const CATEGORY_ROW_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct InsightsBundle {
    pub summary: Summary,
    pub recent_days: Vec<SeriesPoint>,
    pub top_products: Vec<ProductRow>,
    pub channels: Vec<ChannelRow>,
    pub geo: Vec<GeoRow>,
    pub anomalies: Vec<DailyAnomaly>,
}

/// Assembles the bundle from the current view. Fails with
/// [`EngineError::InsufficientContext`] when no row carries revenue;
/// callers must render an explicit no-data state instead.
pub fn build(view: &CleanedView, today: NaiveDate) -> Result<InsightsBundle, EngineError> {
    if !view.has_revenue_signal() {
        return Err(EngineError::InsufficientContext(
            "no revenue data in the cleaned view",
        ));
    }

    let daily = view.daily_series();
    let skip = daily.len().saturating_sub(CATEGORY_ROW_LIMIT);
    let recent_days = daily.into_iter().skip(skip).collect();

    Ok(InsightsBundle {
        summary: view.summary_at(today),
        recent_days,
        top_products: view.top_products(&TopOptions {
            limit: CATEGORY_ROW_LIMIT,
            offset: 0,
            direction: SortDirection::Desc,
        }),
        channels: view
            .channel_breakdown()
            .into_iter()
            .take(CATEGORY_ROW_LIMIT)
            .collect(),
        geo: view
            .geo_breakdown()
            .into_iter()
            .take(CATEGORY_ROW_LIMIT)
            .collect(),
        anomalies: view
            .anomalies()
            .into_iter()
            .take(CATEGORY_ROW_LIMIT)
            .collect(),
    })
}

pub fn to_json(bundle: &InsightsBundle) -> Result<String> {
    serde_json::to_string_pretty(bundle).context("Serializing insights bundle to JSON")
}
