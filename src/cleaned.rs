//! The cleaned relation: a normalized, typed view derived from the raw
//! table through the current column mapping.
//!
//! Materialization is wholesale and idempotent: the view is rebuilt from
//! scratch each time, never patched. A failed cast nulls the cell and
//! keeps the row; an unmapped canonical field yields an all-null column.
//! [`CleanedView`] is an explicitly owned handle that callers construct
//! and pass around, so tests can build independent views.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{
    ingest::RawTable,
    mapper::{CanonicalField, ColumnMap},
    value,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanedRow {
    pub order_id: Option<String>,
    pub product: Option<String>,
    pub ts: Option<NaiveDateTime>,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
    pub channel: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub revenue: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct CleanedView {
    rows: Vec<CleanedRow>,
}

impl CleanedView {
    /// Rebuilds the cleaned relation from the raw table and the current
    /// mapping. Revenue comes from the mapped revenue column when one
    /// exists; otherwise it is derived as price × quantity when both are
    /// mapped; otherwise it is null for every row.
    pub fn materialize(table: &RawTable, mapping: &ColumnMap) -> Self {
        let resolve =
            |field: CanonicalField| mapping.get(&field).and_then(|name| table.column_index(name));
        let order_idx = resolve(CanonicalField::OrderId);
        let product_idx = resolve(CanonicalField::Product);
        let ts_idx = resolve(CanonicalField::Timestamp);
        let quantity_idx = resolve(CanonicalField::Quantity);
        let price_idx = resolve(CanonicalField::Price);
        let channel_idx = resolve(CanonicalField::Channel);
        let city_idx = resolve(CanonicalField::City);
        let state_idx = resolve(CanonicalField::State);
        let zip_idx = resolve(CanonicalField::Zip);
        let revenue_idx = resolve(CanonicalField::Revenue);
        let derive_revenue =
            revenue_idx.is_none() && price_idx.is_some() && quantity_idx.is_some();

        let rows = table
            .rows()
            .iter()
            .map(|raw| {
                let cell = |idx: Option<usize>| idx.and_then(|i| raw.get(i)).map(String::as_str);
                let text = |idx| cell(idx).and_then(value::cast_text);
                let number = |idx| cell(idx).and_then(value::cast_number);

                let quantity = number(quantity_idx);
                let price = number(price_idx);
                let revenue = if revenue_idx.is_some() {
                    number(revenue_idx)
                } else if derive_revenue {
                    match (price, quantity) {
                        (Some(price), Some(quantity)) => Some(price * quantity),
                        _ => None,
                    }
                } else {
                    None
                };

                CleanedRow {
                    order_id: text(order_idx),
                    product: text(product_idx),
                    ts: cell(ts_idx).and_then(value::cast_timestamp),
                    quantity,
                    price,
                    channel: text(channel_idx),
                    city: text(city_idx),
                    state: text(state_idx),
                    zip: text(zip_idx),
                    revenue,
                }
            })
            .collect();

        Self { rows }
    }

    pub fn rows(&self) -> &[CleanedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when at least one row carries a non-null revenue value.
    pub fn has_revenue_signal(&self) -> bool {
        self.rows.iter().any(|row| row.revenue.is_some())
    }
}
