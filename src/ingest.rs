//! Raw table ingestion.
//!
//! Loads a delimited file (or stdin) into an in-memory [`RawTable`]:
//! header row, string cells, and a content hash over the raw bytes that
//! keys cached inference snapshots. The aggregation engine recomputes its
//! cleaned view wholesale from this table, so the whole dataset is held in
//! memory rather than streamed.
//!
//! Ingest caps live here: at most [`MAX_COLUMNS`] columns, and an optional
//! row cap supplied by the caller. The analytics core downstream assumes
//! it receives already-validated data.

use std::{
    fs,
    io::Read,
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use log::debug;
use sha2::{Digest, Sha256};

use crate::error::EngineError;

pub const MAX_COLUMNS: usize = 200;
pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

/// An uploaded dataset: ordered named columns and string rows, replaced
/// wholesale on each new load.
#[derive(Debug, Clone)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    content_hash: String,
}

impl RawTable {
    /// Builds a table from already-parsed cells, enforcing the same caps
    /// as file ingestion. The content hash covers every cell.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        ensure_column_cap(columns.len())?;
        let mut hasher = Sha256::new();
        for name in &columns {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
        }
        for row in &rows {
            for cell in row {
                hasher.update(cell.as_bytes());
                hasher.update([0u8]);
            }
            hasher.update([1u8]);
        }
        Ok(Self {
            columns,
            rows,
            content_hash: hex_digest(hasher.finalize().as_slice()),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Reads the whole input, hashes it, and materializes the raw table.
/// `row_limit` of 0 means no cap.
pub fn load_table(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
    row_limit: usize,
) -> Result<RawTable> {
    let bytes = read_input_bytes(path)?;
    let content_hash = hex_digest(Sha256::digest(&bytes).as_slice());

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(bytes.as_slice());

    let header_record = reader
        .byte_headers()
        .with_context(|| format!("Reading header row from {path:?}"))?
        .clone();
    let columns = decode_record(&header_record, encoding)?;
    if columns.is_empty() || columns.iter().all(|name| name.trim().is_empty()) {
        return Err(EngineError::EmptyInput.into());
    }
    ensure_column_cap(columns.len())?;

    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        if row_limit > 0 && row_idx >= row_limit {
            debug!("Row cap of {row_limit} reached; remaining rows ignored");
            break;
        }
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        rows.push(decode_record(&record, encoding)?);
    }

    debug!(
        "Loaded {} row(s) across {} column(s) from {:?}",
        rows.len(),
        columns.len(),
        path
    );
    Ok(RawTable {
        columns,
        rows,
        content_hash,
    })
}

fn ensure_column_cap(found: usize) -> Result<()> {
    if found > MAX_COLUMNS {
        return Err(EngineError::TooManyColumns { found }.into());
    }
    Ok(())
}

fn read_input_bytes(path: &Path) -> Result<Vec<u8>> {
    if is_dash(path) {
        let mut bytes = Vec::new();
        std::io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Reading from stdin")?;
        Ok(bytes)
    } else {
        fs::read(path).with_context(|| format!("Opening input file {path:?}"))
    }
}

fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| {
            let (text, _, had_errors) = encoding.decode(field);
            if had_errors {
                Err(anyhow!(
                    "Failed to decode text with encoding {}",
                    encoding.name()
                ))
            } else {
                Ok(text.into_owned())
            }
        })
        .collect()
}

fn hex_digest(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
