//! Run reports: comparison table, summary file, artifact tree

use super::{EngineResult, EngineStatus, RunState};
use crate::catalog::Metric;
use crate::config::Strategy;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SUMMARY_FILE: &str = "summary.json";

/// One engine's line in the comparison table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub engine: String,
    pub status: EngineStatus,
    /// Score under the run metric; `None` for failed engines
    pub score: Option<f64>,
    pub r2: Option<f64>,
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    pub duration_secs: f64,
    pub pipeline: Option<String>,
    pub champion: bool,
}

impl ComparisonRow {
    pub(crate) fn from_result(result: &EngineResult, champion: bool) -> Self {
        Self {
            engine: result.name.clone(),
            status: result.status,
            score: result.score,
            r2: result.metrics.map(|m| m.r2),
            rmse: result.metrics.map(|m| m.rmse),
            mae: result.metrics.map(|m| m.mae),
            duration_secs: result.duration_secs,
            pipeline: result.info.as_ref().map(|i| i.best_pipeline.clone()),
            champion,
        }
    }
}

/// Persisted run summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub metric: Metric,
    pub strategy: Strategy,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub run_dir: PathBuf,
    pub champion: Option<String>,
    pub comparison: Vec<ComparisonRow>,
    pub transitions: Vec<(RunState, RunState)>,
}

impl RunSummary {
    pub fn write(&self, run_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(run_dir)?;
        let path = run_dir.join(SUMMARY_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".to_string())
}

/// Plain-text comparison table, one engine per line in priority order
pub fn format_table(rows: &[ComparisonRow], metric: Metric) -> String {
    let mut out = format!(
        "{:<2} {:<10} {:<9} {:>12} {:>9} {:>10} {:>10} {:>9}\n",
        "", "engine", "status", metric.name().trim_start_matches("neg_"), "r2", "rmse", "mae", "time(s)"
    );
    for row in rows {
        out.push_str(&format!(
            "{:<2} {:<10} {:<9} {:>12} {:>9} {:>10} {:>10} {:>9.2}\n",
            if row.champion { "*" } else { "" },
            row.engine,
            row.status.to_string(),
            fmt_opt(row.score),
            fmt_opt(row.r2),
            fmt_opt(row.rmse),
            fmt_opt(row.mae),
            row.duration_secs
        ));
    }
    out
}

/// Indented listing of every file under `root`, directories first, names sorted
pub fn artifact_tree(root: &Path) -> Result<String> {
    fn walk(dir: &Path, depth: usize, out: &mut String) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| (!e.path().is_dir(), e.file_name()));
        for entry in entries {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if path.is_dir() {
                out.push_str(&format!("{}{}/\n", "  ".repeat(depth), name));
                walk(&path, depth + 1, out)?;
            } else {
                out.push_str(&format!("{}{}\n", "  ".repeat(depth), name));
            }
        }
        Ok(())
    }

    let mut out = format!("{}/\n", root.display());
    walk(root, 1, &mut out)?;
    Ok(out)
}
