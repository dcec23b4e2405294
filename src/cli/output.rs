use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use crate::error::{NominaError, Result};
use crate::model::PayrollRecord;
use crate::utils::format::{format_mxn, truncate_string};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Robot,
}

#[derive(Serialize)]
pub struct RobotResponse<T> {
    pub status: RobotStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotStatus {
    Ok,
    Partial { completed: usize, failed: usize },
}

pub fn robot_ok<T: Serialize>(data: T) -> RobotResponse<T> {
    RobotResponse {
        status: RobotStatus::Ok,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data,
        warnings: Vec::new(),
    }
}

pub fn robot_partial<T: Serialize>(
    data: T,
    completed: usize,
    failed: usize,
    warnings: Vec<String>,
) -> RobotResponse<T> {
    RobotResponse {
        status: if failed == 0 {
            RobotStatus::Ok
        } else {
            RobotStatus::Partial { completed, failed }
        },
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data,
        warnings,
    }
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| NominaError::Serialization(format!("serialize output: {err}")))?;
    println!("{payload}");
    Ok(())
}

pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanLayout {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 18,
        }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.lines.push(text.bold().to_string());
        self.lines.push(String::new());
        self
    }

    pub fn section(&mut self, text: &str) -> &mut Self {
        self.lines.push(text.bold().to_string());
        self.lines.push("-".repeat(text.chars().count().max(3)));
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        let padded = format!("{key:width$}", width = self.key_width);
        self.lines.push(format!("{} {value}", padded.dimmed()));
        self
    }

    pub fn bullet(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("- {text}"));
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    /// One summary row per record: RFC, name, check, net pay, period.
    pub fn record_rows<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a PayrollRecord>,
    ) -> &mut Self {
        for record in records {
            self.lines.push(format!(
                "{:<14} {:<36} {:>10} {:>14}  {}",
                record.rfc().cyan(),
                truncate_string(&record.formatted_name(), 36),
                record.cheque(),
                record.liquido_display().green(),
                record.period_label().dimmed(),
            ));
        }
        self
    }

    /// Full paystub: every concept with its amount, then totals.
    pub fn paystub(&mut self, record: &PayrollRecord) -> &mut Self {
        let fields = record.fields();
        self.section(&format!("{} · cheque {}", record.formatted_name(), fields.cheque));
        self.kv("RFC", &fields.rfc)
            .kv("Plaza", &fields.plaza)
            .kv("CCT", &fields.cct)
            .kv("Puesto", &fields.puesto_cdc)
            .kv("Periodo", &record.period_label());
        for (concepto, importe) in record.items() {
            let amount = format_mxn(importe);
            let amount = if importe < 0.0 {
                amount.red().to_string()
            } else {
                amount
            };
            self.push_line(format!("  {concepto:<32} {amount:>14}"));
        }
        self.kv("Percepciones", &format_mxn(record.total_percepciones()))
            .kv("Deducciones", &format_mxn(record.total_deducciones()))
            .kv("Líquido", &record.liquido_display().bold().to_string())
            .blank()
    }

    #[must_use]
    pub fn build(&self) -> String {
        self.lines.join("\n")
    }
}

pub fn emit_human(layout: &HumanLayout) {
    println!("{}", layout.build());
}
