//! nomina load - Seed the persistent store

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_partial};
use crate::error::Result;
use crate::storage::SeedOutcome;
use crate::utils::format::format_size;

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Source file (defaults to the configured candidates)
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Drop existing rows and reload even if the store is populated
    #[arg(long)]
    pub force: bool,
}

pub fn run(ctx: &AppContext, args: &LoadArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let loader = ctx.loader(args.source.as_deref());

    let spinner = (!ctx.robot()).then(|| spinner("Loading payroll source..."));
    let outcome = if args.force {
        store.reload(&loader)
    } else {
        store.ensure_seeded(&loader)
    };
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }
    let outcome = outcome?;

    if ctx.robot() {
        let (completed, failed, warnings) = match &outcome {
            SeedOutcome::AlreadySeeded { records } => (*records, 0, Vec::new()),
            SeedOutcome::Seeded { insert, .. } => {
                (insert.inserted, insert.failed_batches, insert.errors.clone())
            }
        };
        return emit_json(&robot_partial(&outcome, completed, failed, warnings));
    }

    let mut layout = HumanLayout::new();
    match &outcome {
        SeedOutcome::AlreadySeeded { records } => {
            layout
                .title("Store already loaded")
                .kv("Records", &records.to_string())
                .kv("Database", &store.path().display().to_string())
                .push_line("Use --force to reload.");
        }
        SeedOutcome::Seeded { load, insert } => {
            layout
                .title("Payroll store loaded")
                .kv("Source", &load.path.display().to_string())
                .kv("Size", &format_size(load.bytes))
                .kv(
                    "Encoding",
                    load.encoding.map_or("-", |encoding| encoding.name()),
                )
                .kv("Records", &insert.inserted.to_string())
                .kv("Rejected lines", &load.stats.rejected.to_string())
                .kv("Coerced numbers", &load.stats.coerced_numbers.to_string())
                .kv("Failed batches", &insert.failed_batches.to_string())
                .kv("Elapsed", &format!("{} ms", load.elapsed.as_millis()));
            for error in &insert.errors {
                layout.bullet(error);
            }
        }
    }
    emit_human(&layout);
    Ok(())
}

pub(crate) fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
