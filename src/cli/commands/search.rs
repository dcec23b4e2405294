//! nomina search - Search the in-memory index

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, ValueEnum};
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::commands::load::spinner;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_ok};
use crate::error::{NominaError, Result};
use crate::ingest::LoadReport;
use crate::model::PayrollRecord;
use crate::search::{LookupOutcome, QueryKind, SearchEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchBy {
    /// RFC first, then name
    Auto,
    Rfc,
    Name,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// RFC or name to look for
    pub query: String,

    /// Search strategy
    #[arg(long, value_enum, default_value = "auto")]
    pub by: SearchBy,

    /// Source file (defaults to the configured candidates)
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Maximum number of rows to print
    #[arg(long, short, default_value = "50")]
    pub limit: usize,
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    matched_by: Option<QueryKind>,
    total: usize,
    records: Vec<&'a PayrollRecord>,
    load: &'a LoadReport,
}

pub fn run(ctx: &AppContext, args: &SearchArgs) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let engine = ctx.search_engine();
    let loader = ctx.loader(args.source.as_deref());

    let spinner = (!ctx.robot()).then(|| spinner("Indexing payroll source..."));
    let result = runtime.block_on(async {
        let load = engine
            .spawn_load(loader)
            .await
            .map_err(|err| NominaError::IndexUnavailable(format!("load task failed: {err}")))??;
        let (matched_by, records) = query(&engine, args).await?;
        Ok::<_, NominaError>((load, matched_by, records))
    });
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }
    let (load, matched_by, records) = result?;

    if ctx.robot() {
        let output = SearchOutput {
            query: args.query.trim(),
            matched_by,
            total: records.len(),
            records: records.iter().take(args.limit).map(|record| &**record).collect(),
            load: &load,
        };
        return emit_json(&robot_ok(output));
    }

    let mut layout = HumanLayout::new();
    if records.is_empty() {
        layout.push_line(format!("No records match {:?}.", args.query.trim()));
    } else {
        let strategy = matched_by.map_or("", QueryKind::prefix);
        layout.title(&format!("{} record(s) by {strategy}", records.len()));
        layout.record_rows(records.iter().take(args.limit).map(|record| &**record));
        if records.len() > args.limit {
            layout.blank().push_line(format!(
                "... {} more (raise --limit)",
                records.len() - args.limit
            ));
        }
    }
    emit_human(&layout);
    Ok(())
}

async fn query(
    engine: &SearchEngine,
    args: &SearchArgs,
) -> Result<(Option<QueryKind>, Vec<Arc<PayrollRecord>>)> {
    match args.by {
        SearchBy::Rfc => Ok((
            Some(QueryKind::Rfc),
            engine.search_by_rfc(&args.query).await?,
        )),
        SearchBy::Name => Ok((
            Some(QueryKind::Name),
            engine.search_by_name(&args.query).await?,
        )),
        SearchBy::Auto => match engine.lookup(&args.query).await? {
            LookupOutcome::Found {
                matched_by,
                records,
            } => Ok((Some(matched_by), records)),
            LookupOutcome::Idle | LookupOutcome::NotFound => Ok((None, Vec::new())),
        },
    }
}
