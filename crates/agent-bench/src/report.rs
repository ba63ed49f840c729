//! Markdown comparison table and JSON export

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use tracing::{debug, error};

use crate::record::ResultRecord;
use crate::runner::ResultMatrix;

pub const DEFAULT_REPORT_FILE: &str = "comparison_report.md";

/// Test case × model pivot of a result matrix.
///
/// Columns and rows keep the order in which models and test cases were first
/// seen while walking the matrix.
#[derive(Debug, Clone)]
pub struct ComparisonReport {
    generated_at: NaiveDateTime,
    models: Vec<String>,
    test_cases: Vec<String>,
    cells: HashMap<(String, String), (bool, f64)>,
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

impl ComparisonReport {
    pub fn from_matrix(matrix: &ResultMatrix, generated_at: NaiveDateTime) -> Self {
        let mut models = Vec::new();
        let mut test_cases = Vec::new();
        let mut cells = HashMap::new();

        for record in matrix.records() {
            push_unique(&mut models, record.model_name());
            push_unique(&mut test_cases, record.test_case());
            // a repeated pair keeps the last record
            cells.insert(
                (record.test_case().to_string(), record.model_name().to_string()),
                (record.is_success(), record.duration().as_secs_f64()),
            );
        }

        Self {
            generated_at,
            models,
            test_cases,
            cells,
        }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn test_cases(&self) -> &[String] {
        &self.test_cases
    }

    fn cell(&self, test_case: &str, model: &str) -> Option<(bool, f64)> {
        self.cells
            .get(&(test_case.to_string(), model.to_string()))
            .copied()
    }

    pub fn render(&self) -> String {
        let mut out = String::from("# Model Comparison Report\n\n");
        let _ = write!(
            out,
            "Generated on: {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        );

        out.push_str("| Capability");
        for model in &self.models {
            let _ = write!(out, " | {}", model);
        }
        out.push_str(" |\n");

        out.push_str("|---");
        for _ in &self.models {
            out.push_str("|---");
        }
        out.push_str("|\n");

        for test_case in &self.test_cases {
            let _ = write!(out, "| {}", test_case);
            for model in &self.models {
                out.push_str(match self.cell(test_case, model) {
                    None => " | N/A",
                    Some((true, _)) => " | ✅ Success",
                    Some((false, _)) => " | ❌ Failure",
                });
            }
            out.push_str(" |\n");

            let _ = write!(out, "| {} (timing)", test_case);
            for model in &self.models {
                match self.cell(test_case, model) {
                    None => out.push_str(" | N/A"),
                    Some((_, secs)) => {
                        let _ = write!(out, " | {:.1}s", secs);
                    }
                }
            }
            out.push_str(" |\n");
        }

        out
    }

    /// Write the rendered table, replacing any existing file
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// Render and write the report; write failures are printed and swallowed.
///
/// Returns the path written, or `None` when there was nothing to report or the
/// write failed.
pub fn generate_report(matrix: &ResultMatrix, path: &Path) -> Option<PathBuf> {
    if matrix.is_empty() {
        debug!("No results, skipping comparison report");
        return None;
    }

    let report = ComparisonReport::from_matrix(matrix, Local::now().naive_local());
    if let Err(e) = report.write(path) {
        error!(path = %path.display(), error = %e, "Report write failed");
        println!("Error writing comparison report: {:#}", e);
        return None;
    }

    println!("📊 Comparison report generated: {}", path.display());
    Some(path.to_path_buf())
}

/// Flat list of records as pretty JSON
pub fn write_json<'a>(records: impl IntoIterator<Item = &'a ResultRecord>, path: &Path) -> Result<()> {
    let records: Vec<&ResultRecord> = records.into_iter().collect();
    let json = serde_json::to_string_pretty(&records).context("Failed to serialize results")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), count = records.len(), "Wrote JSON results");
    Ok(())
}
