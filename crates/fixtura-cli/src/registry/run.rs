use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use fixtura_core::{SCHEMA_VERSION, SchemaCatalog};
use fixtura_generate::output::{write_batch_csv, write_batch_json};
use fixtura_generate::{GeneratedBatch, GenerationError, GenerationPolicy, GenerationReport, SessionConfig};

use crate::config::OutputFormat;

use super::{RegistryError, RegistryResult};

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub run_dir: PathBuf,
    pub schema_path: PathBuf,
    /// `--model` path or `app.*`.
    pub target: String,
    pub count: u64,
    pub exclude: Vec<String>,
    pub session: SessionConfig,
    pub policy: GenerationPolicy,
    pub format: OutputFormat,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub schema_version: String,
    pub schema_path: String,
    pub target: String,
    pub count: u64,
    pub exclude: Vec<String>,
    pub session: SessionConfig,
    pub policy: GenerationPolicy,
    pub format: OutputFormat,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub logs_path: PathBuf,
    pub report_path: PathBuf,
    pub instances_path: PathBuf,
}

/// Written to `report.json` once the run finishes.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub run_id: &'a str,
    pub status: &'a str,
    pub catalog_fingerprint: &'a str,
    pub duration_ms: u128,
    pub persisted: usize,
    pub outputs: Vec<String>,
    pub report: &'a GenerationReport,
}

/// Written to `report.json` instead of a summary when a started run fails.
#[derive(Debug, Serialize)]
pub struct RunFailure<'a> {
    pub run_id: &'a str,
    pub status: &'a str,
    pub kind: &'a str,
    pub error: String,
    pub duration_ms: u128,
}

pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx.run_dir.join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&root)?;

    let paths = RunPaths {
        config_path: root.join("config.json"),
        logs_path: root.join("logs.ndjson"),
        report_path: root.join("report.json"),
        instances_path: root.join("instances.ndjson"),
        root,
    };

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        schema_version: SCHEMA_VERSION.to_string(),
        schema_path: ctx.schema_path.display().to_string(),
        target: ctx.target.clone(),
        count: ctx.count,
        exclude: ctx.exclude.clone(),
        session: ctx.session.clone(),
        policy: ctx.policy.clone(),
        format: ctx.format,
        git: collect_git_info(),
    };

    write_json(&paths.config_path, &config)?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.logs_path)?;

    Ok(paths)
}

/// Write the batch in the chosen format; returns the files written.
pub fn write_outputs(
    paths: &RunPaths,
    catalog: &SchemaCatalog,
    batch: &GeneratedBatch,
    format: OutputFormat,
) -> Result<Vec<PathBuf>, GenerationError> {
    match format {
        OutputFormat::Json => {
            let path = paths.root.join("instances.json");
            write_batch_json(&path, batch)?;
            Ok(vec![path])
        }
        OutputFormat::Csv => write_batch_csv(&paths.root, catalog, batch),
    }
}

pub fn write_summary(paths: &RunPaths, summary: &RunSummary<'_>) -> RegistryResult<()> {
    write_json(&paths.report_path, summary)
}

pub fn write_failure(paths: &RunPaths, failure: &RunFailure<'_>) -> RegistryResult<()> {
    write_json(&paths.report_path, failure)
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    serde_json::to_writer_pretty(file, value).map_err(RegistryError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtura_core::{FieldCategory, FieldSpec, ModelSpec};
    use fixtura_generate::GenerationSession;

    fn context(run_dir: PathBuf, format: OutputFormat) -> RunContext {
        RunContext {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            run_dir,
            schema_path: PathBuf::from("demos/shop.catalog.json"),
            target: "shop.Tag".to_string(),
            count: 2,
            exclude: Vec::new(),
            session: SessionConfig::seeded(9).with_persist(true),
            policy: GenerationPolicy::default(),
            format,
        }
    }

    fn temp_run_dir() -> PathBuf {
        std::env::temp_dir().join(format!("fixtura_cli_runs_{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn start_run_lays_out_the_run_directory() {
        let ctx = context(temp_run_dir(), OutputFormat::Json);
        let paths = start_run(&ctx).expect("start run");

        let name = paths
            .root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .expect("run dir name");
        assert!(name.ends_with(&format!("__run_{}", ctx.run_id)));
        assert!(paths.logs_path.is_file());

        let config: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(&paths.config_path).expect("read config.json"),
        )
        .expect("parse config.json");
        assert_eq!(config["session"]["seed"], serde_json::json!(9));
        assert_eq!(config["format"], serde_json::json!("json"));
        assert_eq!(config["schema_version"], serde_json::json!(SCHEMA_VERSION));
    }

    #[test]
    fn csv_outputs_land_in_the_run_directory() {
        let tag = ModelSpec::new(
            "shop",
            "Tag",
            vec![FieldSpec::new("label", FieldCategory::Text).unique()],
            Vec::new(),
        )
        .expect("tag");
        let catalog = SchemaCatalog::new(vec![tag]).expect("catalog");
        let model = catalog.model("Tag").expect("model");
        let outcome = GenerationSession::new(SessionConfig::seeded(9))
            .generate(&catalog, model, 2)
            .expect("generate");

        let ctx = context(temp_run_dir(), OutputFormat::Csv);
        let paths = start_run(&ctx).expect("start run");
        let written = write_outputs(&paths, &catalog, &outcome.batch, ctx.format).expect("write");
        assert_eq!(written, vec![paths.root.join("Tag.csv")]);

        let summary = RunSummary {
            run_id: &ctx.run_id,
            status: "success",
            catalog_fingerprint: "abc",
            duration_ms: 1,
            persisted: 0,
            outputs: vec!["Tag.csv".to_string()],
            report: &outcome.report,
        };
        write_summary(&paths, &summary).expect("summary");
        let report: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(&paths.report_path).expect("read report.json"),
        )
        .expect("parse report.json");
        assert_eq!(report["report"]["models"]["Tag"]["generated"], serde_json::json!(2));
    }

    #[test]
    fn failed_runs_still_leave_a_report() {
        let ctx = context(temp_run_dir(), OutputFormat::Json);
        let paths = start_run(&ctx).expect("start run");
        let failure = RunFailure {
            run_id: &ctx.run_id,
            status: "failed",
            kind: "unknown_model",
            error: "unknown model: Nope".to_string(),
            duration_ms: 3,
        };
        write_failure(&paths, &failure).expect("failure report");

        let report: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(&paths.report_path).expect("read report.json"),
        )
        .expect("parse report.json");
        assert_eq!(report["status"], serde_json::json!("failed"));
        assert_eq!(report["kind"], serde_json::json!("unknown_model"));
        assert_eq!(report["run_id"], serde_json::json!(ctx.run_id));
        assert!(report.get("report").is_none());
    }
}
