//! Schema inference snapshots and their YAML persistence.
//!
//! A [`SchemaInference`] is the immutable result of probing one upload:
//! the per-column canonical mapping, row count, the dataset's date range
//! when a timestamp column was mapped, distinct counts for mapped columns,
//! and the content hash that keys cached snapshots. Produced once per
//! upload and replaced wholesale on the next one.

use std::{
    collections::{BTreeMap, HashSet},
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{
    ingest::RawTable,
    mapper::{self, CanonicalField, ColumnInference, ColumnMap, MappingWarning},
    value,
};

pub const CURRENT_META_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaInference {
    pub columns: Vec<ColumnInference>,
    pub row_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub distinct_counts: BTreeMap<String, usize>,
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_version: Option<String>,
}

impl SchemaInference {
    /// Probes a raw table: classifies every column independently, then
    /// derives the snapshot-level facts. The date range is only computed
    /// when a timestamp column was mapped; distinct counts cover mapped
    /// columns only.
    pub fn from_table(table: &RawTable) -> Self {
        let columns: Vec<ColumnInference> =
            table.columns().iter().map(|name| mapper::infer(name)).collect();
        let (mapping, _) = mapper::build_column_map(&columns);

        let mut distinct_counts = BTreeMap::new();
        for raw_name in mapping.values() {
            if let Some(idx) = table.column_index(raw_name) {
                let mut seen: HashSet<&str> = HashSet::new();
                for row in table.rows() {
                    if let Some(cell) = row.get(idx) {
                        let trimmed = cell.trim();
                        if !trimmed.is_empty() {
                            seen.insert(trimmed);
                        }
                    }
                }
                distinct_counts.insert(raw_name.clone(), seen.len());
            }
        }

        let (min_date, max_date) = match mapping
            .get(&CanonicalField::Timestamp)
            .and_then(|name| table.column_index(name))
        {
            Some(idx) => date_range(table, idx),
            None => (None, None),
        };

        Self {
            columns,
            row_count: table.row_count(),
            min_date,
            max_date,
            distinct_counts,
            content_hash: table.content_hash().to_string(),
            meta_version: Some(CURRENT_META_VERSION.to_string()),
        }
    }

    /// Re-folds the stored inference set into the canonical column map,
    /// surfacing any duplicate-field collisions.
    pub fn column_map(&self) -> (ColumnMap, Vec<MappingWarning>) {
        mapper::build_column_map(&self.columns)
    }

    /// True when this snapshot was probed from the given table's bytes.
    pub fn matches_content(&self, table: &RawTable) -> bool {
        self.content_hash == table.content_hash()
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing inference snapshot to YAML")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating meta file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing inference snapshot YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening meta file {path:?}"))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).context("Parsing inference snapshot YAML")
    }
}

fn date_range(table: &RawTable, column: usize) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
    let mut min = None;
    let mut max = None;
    for row in table.rows() {
        let Some(ts) = row.get(column).and_then(|cell| value::cast_timestamp(cell)) else {
            continue;
        };
        min = Some(match min {
            Some(current) if current < ts => current,
            _ => ts,
        });
        max = Some(match max {
            Some(current) if current > ts => current,
            _ => ts,
        });
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::RawTable;

    fn orders_table() -> RawTable {
        RawTable::from_rows(
            vec![
                "order_id".to_string(),
                "product_name".to_string(),
                "order_date".to_string(),
                "notes".to_string(),
            ],
            vec![
                vec![
                    "1".to_string(),
                    "widget".to_string(),
                    "2024-01-05".to_string(),
                    "x".to_string(),
                ],
                vec![
                    "2".to_string(),
                    "widget".to_string(),
                    "2024-02-01".to_string(),
                    "y".to_string(),
                ],
                vec![
                    "3".to_string(),
                    "gadget".to_string(),
                    "bogus".to_string(),
                    "z".to_string(),
                ],
            ],
        )
        .expect("fixture table")
    }

    #[test]
    fn snapshot_counts_rows_and_distincts_for_mapped_columns_only() {
        let inference = SchemaInference::from_table(&orders_table());
        assert_eq!(inference.row_count, 3);
        assert_eq!(inference.distinct_counts.get("product_name"), Some(&2));
        assert!(!inference.distinct_counts.contains_key("notes"));
    }

    #[test]
    fn date_range_skips_unparseable_cells() {
        let inference = SchemaInference::from_table(&orders_table());
        // order_date maps to order_id by precedence, so no timestamp field
        // is mapped here and the range stays empty.
        assert_eq!(inference.min_date, None);
        assert_eq!(inference.max_date, None);
    }

    #[test]
    fn timestamp_mapping_produces_a_date_range() {
        let table = RawTable::from_rows(
            vec!["product".to_string(), "created_at".to_string()],
            vec![
                vec!["a".to_string(), "2024-03-01".to_string()],
                vec!["b".to_string(), "2024-01-15".to_string()],
                vec!["c".to_string(), "garbage".to_string()],
            ],
        )
        .expect("fixture table");
        let inference = SchemaInference::from_table(&table);
        assert_eq!(
            inference.min_date.map(|d| d.format("%Y-%m-%d").to_string()),
            Some("2024-01-15".to_string())
        );
        assert_eq!(
            inference.max_date.map(|d| d.format("%Y-%m-%d").to_string()),
            Some("2024-03-01".to_string())
        );
    }

    #[test]
    fn yaml_round_trip_preserves_the_snapshot() {
        let inference = SchemaInference::from_table(&orders_table());
        let yaml = inference.to_yaml_string().expect("to yaml");
        let parsed: SchemaInference = serde_yaml::from_str(&yaml).expect("from yaml");
        assert_eq!(parsed.row_count, inference.row_count);
        assert_eq!(parsed.content_hash, inference.content_hash);
        assert_eq!(parsed.columns.len(), inference.columns.len());
        assert_eq!(
            parsed.columns[0].canonical_name,
            inference.columns[0].canonical_name
        );
    }
}
