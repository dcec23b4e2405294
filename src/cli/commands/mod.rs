//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

use clap::Subcommand;

pub mod db;
pub mod load;
pub mod push;
pub mod search;
pub mod show;

use crate::app::AppContext;
use crate::error::Result;

pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Load(args) => load::run(ctx, args),
        Commands::Search(args) => search::run(ctx, args),
        Commands::Db(args) => db::run(ctx, args),
        Commands::Show(args) => show::run(ctx, args),
        Commands::Push(args) => push::run(ctx, args),
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Seed the persistent store from the payroll source
    Load(load::LoadArgs),

    /// Search the in-memory index by RFC or name
    Search(search::SearchArgs),

    /// Query the persistent store
    Db(db::DbArgs),

    /// Show every paystub for an RFC
    Show(show::ShowArgs),

    /// Mirror an RFC's records to the remote store
    Push(push::PushArgs),
}
