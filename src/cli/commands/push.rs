//! nomina push - Mirror stored records to the remote store

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_partial};
use crate::error::{NominaError, Result};
use crate::remote::mirror_records;

#[derive(Args, Debug)]
pub struct PushArgs {
    /// Employee RFC whose records are pushed
    pub rfc: String,

    /// Remote user the records belong to
    #[arg(long, env = "NOMINA_USER_ID")]
    pub user_id: Option<String>,

    /// Access token for the remote user
    #[arg(long, env = "NOMINA_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

pub fn run(ctx: &AppContext, args: &PushArgs) -> Result<()> {
    let identity = AppContext::identity(args.user_id.as_deref(), args.token.as_deref())
        .ok_or(NominaError::NotAuthenticated)?;
    let remote = ctx.remote_store()?;
    let store = ctx.open_store()?;

    let rows = store.find_by_rfc(&args.rfc)?;
    let report = mirror_records(&remote, Some(&identity), rows.iter().map(|row| &row.record))?;

    if ctx.robot() {
        return emit_json(&robot_partial(
            &report,
            report.saved,
            report.failed,
            report.errors.clone(),
        ));
    }

    let mut layout = HumanLayout::new();
    layout
        .title(&format!("Pushed {}", args.rfc.trim().to_uppercase()))
        .kv("Saved", &report.saved.to_string())
        .kv("Failed", &report.failed.to_string());
    for error in &report.errors {
        layout.bullet(error);
    }
    emit_human(&layout);
    Ok(())
}
