//! nomina db - Query the persistent store

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_ok};
use crate::error::Result;
use crate::storage::{PayrollStore, StoredRecord};

#[derive(Args, Debug)]
pub struct DbArgs {
    #[command(subcommand)]
    pub command: DbCommand,
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Ranked substring search over RFC, name and CCT
    Search {
        query: String,
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// First rows ordered by name
    Browse {
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Full-text token search (prefix per term)
    Fts {
        query: String,
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Number of stored records
    Count,
}

#[derive(Serialize)]
struct RowsOutput<'a> {
    count: usize,
    records: &'a [StoredRecord],
}

pub fn run(ctx: &AppContext, args: &DbArgs) -> Result<()> {
    let store = ctx.open_store()?;

    let rows = match &args.command {
        DbCommand::Count => return count(ctx, &store),
        DbCommand::Search { query, limit } => {
            store.search(query, limit.unwrap_or(store.search_limit()))?
        }
        DbCommand::Browse { limit } => store.browse(limit.unwrap_or(store.browse_limit()))?,
        DbCommand::Fts { query, limit } => {
            store.full_text_search(query, limit.unwrap_or(store.search_limit()))?
        }
    };

    if ctx.robot() {
        return emit_json(&robot_ok(RowsOutput {
            count: rows.len(),
            records: &rows,
        }));
    }

    let mut layout = HumanLayout::new();
    if rows.is_empty() {
        layout.push_line("No stored records match.");
    } else {
        layout.record_rows(rows.iter().map(|row| &row.record));
    }
    emit_human(&layout);
    Ok(())
}

fn count(ctx: &AppContext, store: &PayrollStore) -> Result<()> {
    let records = store.count()?;
    if ctx.robot() {
        return emit_json(&robot_ok(serde_json::json!({ "count": records })));
    }
    println!("{records}");
    Ok(())
}
