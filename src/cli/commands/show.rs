//! nomina show - Paystub detail for an RFC

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_ok};
use crate::error::Result;
use crate::storage::StoredRecord;
use crate::utils::format::format_mxn;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Employee RFC
    pub rfc: String,
}

#[derive(Serialize)]
struct PaystubOutput<'a> {
    #[serde(flatten)]
    stored: &'a StoredRecord,
    percepciones: f64,
    deducciones: f64,
    liquido_pesos: f64,
    rfc_valid: bool,
}

pub fn run(ctx: &AppContext, args: &ShowArgs) -> Result<()> {
    let store = ctx.open_store()?;
    store.ensure_seeded(&ctx.loader(None))?;
    let rows = store.find_by_rfc(&args.rfc)?;

    if ctx.robot() {
        let stubs: Vec<PaystubOutput<'_>> = rows
            .iter()
            .map(|stored| PaystubOutput {
                stored,
                percepciones: stored.record.total_percepciones(),
                deducciones: stored.record.total_deducciones(),
                liquido_pesos: stored.record.liquido_pesos(),
                rfc_valid: stored.record.has_valid_rfc(),
            })
            .collect();
        return emit_json(&robot_ok(stubs));
    }

    let mut layout = HumanLayout::new();
    if rows.is_empty() {
        layout.push_line(format!("No stored records for RFC {}.", args.rfc.trim()));
        emit_human(&layout);
        return Ok(());
    }

    layout.title(&format!("{} paystub(s) for {}", rows.len(), args.rfc.trim().to_uppercase()));
    for row in &rows {
        layout.paystub(&row.record);
    }
    let total: f64 = rows.iter().map(|row| row.record.liquido_pesos()).sum();
    layout.kv("Total líquido", &format_mxn(total));
    emit_human(&layout);
    Ok(())
}
