use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about = "Analyze sales CSV exports", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Probe a CSV file and map its columns onto the canonical sales schema
    Probe(ProbeArgs),
    /// Print revenue and quantity totals with growth rates
    Summary(SummaryArgs),
    /// Print a revenue/quantity time series bucketed by day or month
    Series(SeriesArgs),
    /// Rank products by revenue
    Products(ProductsArgs),
    /// Break revenue down by state and city
    Geo(QueryArgs),
    /// Break revenue down by sales channel
    Channels(QueryArgs),
    /// Flag days with anomalous revenue
    Anomalies(QueryArgs),
    /// Answer a free-text question with one of the fixed query templates
    Ask(AskArgs),
    /// Emit the flattened aggregate bundle consumed by the insights prompt
    Insights(InsightsArgs),
}

#[derive(Debug, Args)]
pub struct DataArgs {
    /// Input CSV file ('-' reads from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Previously probed meta file; skips re-inferring the column mapping
    #[arg(short, long)]
    pub meta: Option<PathBuf>,
    /// Maximum number of data rows to ingest (0 means no cap)
    #[arg(long = "row-limit", default_value_t = 100_000)]
    pub row_limit: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub data: DataArgs,
    /// Destination meta file for the inference snapshot
    #[arg(short = 'o', long = "meta-out")]
    pub meta_out: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub data: DataArgs,
    /// Anchor growth buckets to this date instead of today (YYYY-MM-DD)
    #[arg(long = "as-of")]
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Args)]
pub struct SeriesArgs {
    #[command(flatten)]
    pub data: DataArgs,
    /// Bucket size for the series
    #[arg(long, value_enum, default_value_t = Granularity::Day)]
    pub granularity: Granularity,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum Granularity {
    Day,
    Month,
}

#[derive(Debug, Args)]
pub struct ProductsArgs {
    #[command(flatten)]
    pub data: DataArgs,
    /// Maximum number of products to print (0 means all)
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
    /// Number of leading products to skip
    #[arg(long, default_value_t = 0)]
    pub offset: usize,
    /// Revenue sort direction
    #[arg(long, value_enum, default_value_t = Direction::Desc)]
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[command(flatten)]
    pub data: DataArgs,
}

#[derive(Debug, Args)]
pub struct AskArgs {
    #[command(flatten)]
    pub data: DataArgs,
    /// Free-text question to route
    pub question: String,
    /// Emit the routed answer as JSON instead of a table
    #[arg(long)]
    pub json: bool,
    /// Anchor the summary template to this date instead of today
    #[arg(long = "as-of")]
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Args)]
pub struct InsightsArgs {
    #[command(flatten)]
    pub data: DataArgs,
    /// Output file for the JSON bundle (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Anchor growth buckets to this date instead of today
    #[arg(long = "as-of")]
    pub as_of: Option<NaiveDate>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_named_and_literal_forms() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter(";"), Ok(b';'));
        assert_eq!(parse_delimiter("x"), Ok(b'x'));
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("").is_err());
    }
}
