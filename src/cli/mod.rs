//! AutoML Orchestrator CLI
//!
//! Thin surface over the coordinator: pick engines, budget, metric and strategy, run,
//! then print the comparison table and optionally the artifact tree.

use clap::Parser;
use colored::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::{RunConfig, Strategy};
use crate::coordinator::{artifact_tree, format_table, ComparisonRow, Coordinator, EngineStatus, RunReport};
use crate::engines::{Capabilities, EngineKind, EngineRegistry, DISABLED_ENGINES_ENV};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn warn(s: &str) -> ColoredString   { s.truecolor(230, 190, 90) }
fn bad(s: &str) -> ColoredString    { s.truecolor(235, 100, 100) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn banner() {
    line_box_top();
    line_box_center(&format!("{} {}", "AutoML Orchestrator".white().bold(), dim(env!("CARGO_PKG_VERSION"))));
    line_box_bottom();
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "orchestrator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AutoML Orchestrator: run several AutoML engines on one regression dataset and keep the champion")]
#[command(long_about = None)]
pub struct Cli {
    /// Features file (CSV or Parquet)
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Single-column target file (CSV or Parquet)
    #[arg(long)]
    pub target: Option<PathBuf>,

    /// Run every available engine
    #[arg(long)]
    pub all: bool,

    /// Run the TPE engine
    #[arg(long)]
    pub tpe: bool,

    /// Run the genetic engine
    #[arg(long)]
    pub genetic: bool,

    /// Run the successive-halving engine
    #[arg(long)]
    pub halving: bool,

    /// Time budget per engine, in seconds
    #[arg(long)]
    pub time: Option<f64>,

    /// Metric: r2, neg_mean_squared_error, neg_root_mean_squared_error, neg_mean_absolute_error
    #[arg(long)]
    pub metric: Option<String>,

    /// Parent directory of the timestamped run directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Run engines in parallel instead of one after another
    #[arg(long)]
    pub concurrent: bool,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Comma-separated model families
    #[arg(long, value_delimiter = ',')]
    pub models: Option<Vec<String>>,

    /// Comma-separated preprocessing steps ("none" allowed)
    #[arg(long, value_delimiter = ',')]
    pub preprocessors: Option<Vec<String>>,

    /// Trial cap per engine
    #[arg(long)]
    pub max_trials: Option<usize>,

    /// JSON run configuration; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the artifact tree after the run
    #[arg(long)]
    pub tree: bool,

    /// Print which engines are available and exit
    #[arg(long)]
    pub list_engines: bool,
}

impl Cli {
    fn requested_engines(&self) -> Vec<String> {
        if self.all {
            return vec!["all".to_string()];
        }
        [
            (self.tpe, EngineKind::Tpe),
            (self.genetic, EngineKind::Genetic),
            (self.halving, EngineKind::Halving),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, kind)| kind.id().to_string())
        .collect()
    }

    /// Config file (or defaults) with every given flag applied on top
    pub fn run_config(&self) -> crate::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)?,
            None => RunConfig::new(),
        };
        let engines = self.requested_engines();
        if !engines.is_empty() {
            config = config.with_engines(engines.as_slice());
        }
        if let Some(secs) = self.time {
            let budget = Duration::try_from_secs_f64(secs)
                .map_err(|e| crate::AutoMlError::Configuration(format!("invalid --time {}: {}", secs, e)))?;
            config = config.with_time_budget(budget);
        }
        if let Some(metric) = &self.metric {
            config = config.with_metric(metric.as_str());
        }
        if let Some(dir) = &self.output_dir {
            config = config.with_output_dir(dir);
        }
        if self.concurrent {
            config = config.with_strategy(Strategy::Concurrent);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(models) = &self.models {
            config = config.with_models(models.as_slice());
        }
        if let Some(preprocessors) = &self.preprocessors {
            config = config.with_preprocessors(preprocessors.as_slice());
        }
        if let Some(n) = self.max_trials {
            config = config.with_max_trials(n);
        }
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Entry point used by the binary
pub fn run(cli: &Cli) -> anyhow::Result<()> {
    if cli.list_engines {
        return cmd_list_engines();
    }

    let (data, target) = match (&cli.data, &cli.target) {
        (Some(d), Some(t)) => (d, t),
        _ => anyhow::bail!("both --data and --target are required"),
    };
    check_dataset(data, target)?;
    let config = cli.run_config()?;
    cmd_run(data, target, config, cli.tree)
}

fn check_dataset(data: &Path, target: &Path) -> anyhow::Result<()> {
    let missing: Vec<&Path> = [data, target].into_iter().filter(|p| !p.exists()).collect();
    if missing.is_empty() {
        return Ok(());
    }
    println!("  {} {}", bad("✗"), "Dataset files are missing:".white().bold());
    for path in &missing {
        println!("    {}", muted(&path.display().to_string()));
    }
    anyhow::bail!("Dataset files are missing")
}

pub fn cmd_list_engines() -> anyhow::Result<()> {
    let caps = Capabilities::probe()?;
    section("Engines");
    for descriptor in EngineRegistry::describe_all(&caps) {
        let state = if descriptor.availability { ok("available") } else { warn("unavailable") };
        println!("  {:>2}. {:<10} {}", descriptor.priority + 1, descriptor.name, state);
    }
    println!();
    println!("  {}", dim(&format!("mask engines with {}=tpe,genetic", DISABLED_ENGINES_ENV)));
    Ok(())
}

pub fn cmd_run(data: &Path, target: &Path, config: RunConfig, tree: bool) -> anyhow::Result<()> {
    banner();

    section("Data");
    step_run("Loading dataset");
    let start = Instant::now();
    let (x, y) = crate::data::load(data, target)?;
    step_done(&format!("{} rows × {} features in {:.2?}", x.nrows(), x.ncols(), start.elapsed()));

    section("Run");
    println!("  {}", kv("engines   ", &config.engines.join(", ")));
    println!("  {}", kv("budget    ", &format!("{}s per engine", config.time_budget_secs)));
    println!("  {}", kv("metric    ", &config.metric));
    println!("  {}", kv("strategy  ", &config.strategy.to_string()));
    println!("  {}", kv("seed      ", &config.seed.to_string()));

    let mut coordinator = Coordinator::from_environment(config)?;
    let report = coordinator.run(&x, &y)?;
    step_ok(&format!("run finished in {}", report.run_dir.display()));

    print_report(&report);
    if tree {
        section("Artifacts");
        for line in artifact_tree(&report.run_dir)?.lines() {
            println!("  {}", line);
        }
    }
    Ok(())
}

fn format_score(v: Option<f64>) -> String {
    v.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".to_string())
}

fn styled_row(line: &str, row: &ComparisonRow) -> ColoredString {
    match row.status {
        EngineStatus::Success if row.champion => ok(line).bold(),
        EngineStatus::Success => line.normal(),
        EngineStatus::Fallback => warn(line),
        EngineStatus::Failed => bad(line),
    }
}

pub fn print_report(report: &RunReport) {
    section("Comparison");
    let rows = report.comparison_table();
    let table = format_table(&rows, report.metric);
    let mut lines = table.lines();
    if let Some(header) = lines.next() {
        println!("  {}", dim(header));
    }
    for (line, row) in lines.zip(&rows) {
        println!("  {}", styled_row(line, row));
    }
    for result in report.results.iter().filter(|r| r.error.is_some()) {
        println!("  {} {}: {}", warn("!"), result.name, muted(result.error.as_deref().unwrap_or("")));
    }

    if let Some(selection) = report.champion() {
        section("Champion");
        println!("  {}", kv("engine    ", &accent(&selection.result.name).to_string()));
        println!("  {}", kv("score     ", &format_score(selection.result.score)));
        if let Some(info) = &selection.result.info {
            println!("  {}", kv("pipeline  ", &info.best_pipeline));
            println!("  {}", kv("trials    ", &format!("{} ({} failed)", info.n_trials, info.n_failed_trials)));
        }
    }
    if let Some(path) = &report.summary_path {
        println!();
        println!("  {}", dim(&format!("summary written to {}", path.display())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_help_mentions_orchestrator() {
        let help = Cli::command().render_help().to_string();
        assert!(help.contains("AutoML Orchestrator"));
        assert!(help.contains("--concurrent"));
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "orchestrator",
            "--data",
            "x.csv",
            "--target",
            "y.csv",
            "--tpe",
            "--halving",
            "--time",
            "2.5",
            "--metric",
            "neg_mean_absolute_error",
            "--concurrent",
            "--models",
            "Ridge,Lasso",
        ]);
        let config = cli.run_config().unwrap();
        assert_eq!(config.engines, vec!["tpe", "halving"]);
        assert_eq!(config.time_budget_secs, 2.5);
        assert_eq!(config.metric, "neg_mean_absolute_error");
        assert_eq!(config.strategy, Strategy::Concurrent);
        assert_eq!(config.models, vec!["Ridge", "Lasso"]);
    }

    #[test]
    fn test_all_wins_over_individual_flags() {
        let cli = Cli::parse_from(["orchestrator", "--all", "--genetic"]);
        assert_eq!(cli.run_config().unwrap().engines, vec!["all"]);
    }

    #[test]
    fn test_champion_row_is_highlighted() {
        colored::control::set_override(true);
        let row = ComparisonRow {
            engine: "tpe".to_string(),
            status: EngineStatus::Success,
            score: Some(0.9),
            r2: Some(0.9),
            rmse: Some(0.1),
            mae: Some(0.1),
            duration_secs: 1.0,
            pipeline: None,
            champion: true,
        };
        let table = format_table(std::slice::from_ref(&row), crate::catalog::Metric::R2);
        let line = table.lines().nth(1).unwrap();
        let styled = styled_row(line, &row).to_string();
        assert_ne!(styled, line);
        assert_eq!(strip_ansi(&styled), line);
        colored::control::unset_override();
    }

    #[test]
    fn test_missing_dataset_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_dataset(&dir.path().join("x.csv"), &dir.path().join("y.csv")).unwrap_err();
        assert!(err.to_string().contains("Dataset files are missing"));
    }
}
