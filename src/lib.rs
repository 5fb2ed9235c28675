pub mod aggregate;
pub mod cleaned;
pub mod cli;
pub mod error;
pub mod ingest;
pub mod insights;
pub mod mapper;
pub mod router;
pub mod schema;
pub mod table;
pub mod value;

use std::{env, fs, sync::OnceLock};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use log::{LevelFilter, info, warn};

use crate::{
    aggregate::{SortDirection, TopOptions},
    cleaned::CleanedView,
    cli::{
        AskArgs, Cli, Commands, DataArgs, Direction, Granularity, InsightsArgs, ProbeArgs,
        ProductsArgs, QueryArgs, SeriesArgs, SummaryArgs,
    },
    ingest::RawTable,
    schema::SchemaInference,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("saleslens", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Summary(args) => handle_summary(&args),
        Commands::Series(args) => handle_series(&args),
        Commands::Products(args) => handle_products(&args),
        Commands::Geo(args) => handle_geo(&args),
        Commands::Channels(args) => handle_channels(&args),
        Commands::Anomalies(args) => handle_anomalies(&args),
        Commands::Ask(args) => handle_ask(&args),
        Commands::Insights(args) => handle_insights(&args),
    }
}

fn load_raw(data: &DataArgs) -> Result<RawTable> {
    let delimiter = ingest::resolve_delimiter(&data.input, data.delimiter);
    let encoding = ingest::resolve_encoding(data.input_encoding.as_deref())?;
    ingest::load_table(&data.input, delimiter, encoding, data.row_limit)
}

fn resolve_inference(data: &DataArgs, raw: &RawTable) -> Result<SchemaInference> {
    match &data.meta {
        Some(path) => {
            let inference = SchemaInference::load(path)
                .with_context(|| format!("Loading meta file {path:?}"))?;
            if !inference.matches_content(raw) {
                warn!(
                    "Meta file {path:?} was probed from different data; mappings may be stale"
                );
            }
            Ok(inference)
        }
        None => Ok(SchemaInference::from_table(raw)),
    }
}

/// Loads the raw table and materializes the cleaned view. The view must be
/// fully built before any aggregate or chat query runs against it, so
/// every handler funnels through here first.
fn materialize_view(data: &DataArgs) -> Result<CleanedView> {
    let raw = load_raw(data)?;
    let inference = resolve_inference(data, &raw)?;
    let (mapping, warnings) = inference.column_map();
    for warning in &warnings {
        warn!("{warning}");
    }
    Ok(CleanedView::materialize(&raw, &mapping))
}

fn anchor_date(as_of: Option<NaiveDate>) -> NaiveDate {
    as_of.unwrap_or_else(|| Local::now().date_naive())
}

fn handle_probe(args: &ProbeArgs) -> Result<()> {
    let raw = load_raw(&args.data)?;
    let inference = SchemaInference::from_table(&raw);
    let (mapping, warnings) = inference.column_map();
    for warning in &warnings {
        warn!("{warning}");
    }

    let headers = vec![
        "column".to_string(),
        "canonical".to_string(),
        "confidence".to_string(),
        "reason".to_string(),
    ];
    let rows = inference
        .columns
        .iter()
        .map(|column| {
            vec![
                column.original_name.clone(),
                column
                    .canonical_name
                    .map(|field| field.to_string())
                    .unwrap_or_default(),
                format!("{:.2}", column.confidence),
                column.reason.clone(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);

    if let Some(path) = &args.meta_out {
        inference
            .save(path)
            .with_context(|| format!("Writing meta file {path:?}"))?;
        info!(
            "Mapped {} of {} column(s) over {} row(s); meta written to {:?}",
            mapping.len(),
            inference.columns.len(),
            inference.row_count,
            path
        );
    } else {
        info!(
            "Mapped {} of {} column(s) over {} row(s)",
            mapping.len(),
            inference.columns.len(),
            inference.row_count
        );
    }
    Ok(())
}

fn handle_summary(args: &SummaryArgs) -> Result<()> {
    let view = materialize_view(&args.data)?;
    let summary = view.summary_at(anchor_date(args.as_of));
    let headers = vec![
        "total_revenue".to_string(),
        "total_quantity".to_string(),
        "rows".to_string(),
        "min_date".to_string(),
        "max_date".to_string(),
        "mom_growth".to_string(),
        "yoy_growth".to_string(),
    ];
    let rows = vec![vec![
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
    ]];
    table::print_table(&headers, &rows);
    info!("Summarized {} row(s)", summary.row_count);
    Ok(())
}

fn handle_series(args: &SeriesArgs) -> Result<()> {
    let view = materialize_view(&args.data)?;
    let (points, bucket_format) = match args.granularity {
        Granularity::Day => (view.daily_series(), "%Y-%m-%d"),
        Granularity::Month => (view.monthly_series(), "%Y-%m"),
    };
    let headers = vec![
        "bucket".to_string(),
        "revenue".to_string(),
        "quantity".to_string(),
    ];
    let rows = points
        .iter()
        .map(|point| {
            vec![
                point.bucket.format(bucket_format).to_string(),
                value::format_amount(point.revenue),
                value::format_quantity(point.quantity),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!("Computed {} series bucket(s)", rows.len());
    Ok(())
}

fn handle_products(args: &ProductsArgs) -> Result<()> {
    let view = materialize_view(&args.data)?;
    let options = TopOptions {
        limit: args.limit,
        offset: args.offset,
        direction: match args.direction {
            Direction::Asc => SortDirection::Asc,
            Direction::Desc => SortDirection::Desc,
        },
    };
    let products = view.top_products(&options);
    let headers = vec![
        "product".to_string(),
        "revenue".to_string(),
        "quantity".to_string(),
    ];
    let rows = products
        .iter()
        .map(|row| {
            vec![
                row.product.clone(),
                value::format_amount(row.revenue),
                value::format_quantity(row.quantity),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!("Ranked {} product(s)", rows.len());
    Ok(())
}

fn handle_geo(args: &QueryArgs) -> Result<()> {
    let view = materialize_view(&args.data)?;
    let headers = vec![
        "state".to_string(),
        "city".to_string(),
        "revenue".to_string(),
        "quantity".to_string(),
    ];
    let rows = view
        .geo_breakdown()
        .into_iter()
        .map(|row| {
            vec![
                row.state.unwrap_or_default(),
                row.city.unwrap_or_default(),
                value::format_amount(row.revenue),
                value::format_quantity(row.quantity),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!("Computed {} geo group(s)", rows.len());
    Ok(())
}

fn handle_channels(args: &QueryArgs) -> Result<()> {
    let view = materialize_view(&args.data)?;
    let headers = vec![
        "channel".to_string(),
        "revenue".to_string(),
        "quantity".to_string(),
    ];
    let rows = view
        .channel_breakdown()
        .into_iter()
        .map(|row| {
            vec![
                row.channel,
                value::format_amount(row.revenue),
                value::format_quantity(row.quantity),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!("Computed {} channel group(s)", rows.len());
    Ok(())
}

fn handle_anomalies(args: &QueryArgs) -> Result<()> {
    let view = materialize_view(&args.data)?;
    let anomalies = view.anomalies();
    let headers = vec![
        "day".to_string(),
        "revenue".to_string(),
        "zscore".to_string(),
    ];
    let rows = anomalies
        .iter()
        .map(|anomaly| {
            vec![
                anomaly.day.format("%Y-%m-%d").to_string(),
                value::format_amount(anomaly.revenue),
                format!("{:.2}", anomaly.zscore),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    if rows.is_empty() {
        info!("No anomalous days detected");
    } else {
        info!("Flagged {} anomalous day(s)", rows.len());
    }
    Ok(())
}

fn handle_ask(args: &AskArgs) -> Result<()> {
    let view = materialize_view(&args.data)?;
    let answer = router::route(&view, &args.question, anchor_date(args.as_of));
    if args.json {
        let rendered =
            serde_json::to_string(&answer).context("Serializing routed answer to JSON")?;
        println!("{rendered}");
    } else {
        table::print_table(&answer.headers, &answer.rows);
    }
    info!("Routed question to '{}' template", answer.template);
    Ok(())
}

fn handle_insights(args: &InsightsArgs) -> Result<()> {
    let view = materialize_view(&args.data)?;
    let bundle = insights::build(&view, anchor_date(args.as_of))?;
    let rendered = insights::to_json(&bundle)?;
    match &args.output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("Writing insights bundle to {path:?}"))?;
            info!("Insights bundle written to {path:?}");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}
