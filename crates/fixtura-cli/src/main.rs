mod config;
mod registry;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{ArgGroup, Parser};
use fixtura_core::Error as CoreError;
use fixtura_generate::output::batch_to_json;
use fixtura_generate::{
    Flavor, GenerationError, GenerationOutcome, GenerationSession, JsonLinesAdapter, Overrides,
};
use fixtura_introspect::{JsonDocumentSource, SchemaSource};
use thiserror::Error;
use uuid::Uuid;

use config::{ConfigError, OutputFormat};
use registry::{
    RunContext, RunFailure, RunSummary, init_logging, start_run, write_failure, write_outputs,
    write_summary,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        CliError::Generation(err.into())
    }
}

impl From<fixtura_generate::PersistError> for CliError {
    fn from(err: fixtura_generate::PersistError) -> Self {
        CliError::Generation(err.into())
    }
}

impl CliError {
    fn kind(&self) -> &'static str {
        match self {
            CliError::Registry(_) => "registry",
            CliError::Generation(err) => err.kind(),
            CliError::Config(_) | CliError::InvalidConfig(_) => "invalid_config",
        }
    }

    /// 2 for problems with what the user supplied, 1 for failed generation.
    fn exit_code(&self) -> u8 {
        match self.kind() {
            "invalid_config" | "schema_validation" | "unknown_model" | "invalid_override" => 2,
            _ => 1,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "fixtura", version, about = "Seeded test fixture generation")]
#[command(group(ArgGroup::new("target").required(true).args(["model", "app"])))]
struct Cli {
    /// Schema catalog document (JSON).
    #[arg(long, value_name = "FILE")]
    schema: PathBuf,
    /// Model to generate, as `Name` or `app.Name`.
    #[arg(long, value_name = "PATH")]
    model: Option<String>,
    /// Generate every model of this app.
    #[arg(long, value_name = "LABEL")]
    app: Option<String>,
    /// Instances per requested model [default: 1].
    #[arg(long)]
    count: Option<u64>,
    /// Persist the batch into a run directory.
    #[arg(long, default_value_t = false)]
    save: bool,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    flavor: Option<Flavor>,
    /// Locale tag such as `en_US` or `pt_BR`.
    #[arg(long)]
    locale: Option<String>,
    /// Models to skip with `--app`.
    #[arg(long, value_name = "NAME", requires = "app")]
    exclude: Vec<String>,
    /// Field or relationship override, `key=value` (value parsed as JSON, else text).
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
    /// Output directory for runs [default: runs].
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output written into the run directory [default: json].
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
    /// TOML configuration file [default: ./fixtura.toml when present].
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(event = "run_failed", kind = err.kind(), error = %err);
            eprintln!("error[{}]: {err}", err.kind());
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let file = config::load(cli.config.as_deref())?;
    let session_config = file.session_config(cli.seed, cli.flavor, cli.locale.clone(), cli.save);
    let policy = file.policy.clone();
    let count = cli.count.or(file.session.count).unwrap_or(1);
    let format = cli.format.or(file.session.format).unwrap_or_default();
    let out = cli
        .out
        .clone()
        .or_else(|| file.session.out.clone())
        .unwrap_or_else(|| PathBuf::from("runs"));
    let overrides = parse_overrides(&cli.set)?;
    let target = match (&cli.model, &cli.app) {
        (Some(path), None) => path.clone(),
        (None, Some(app)) => format!("{app}.*"),
        _ => {
            return Err(CliError::InvalidConfig(
                "use exactly one of --model or --app".to_string(),
            ));
        }
    };

    let run = if cli.save {
        let ctx = RunContext {
            run_id: Uuid::new_v4().to_string(),
            started_at: chrono::Utc::now(),
            run_dir: out,
            schema_path: cli.schema.clone(),
            target: target.clone(),
            count,
            exclude: cli.exclude.clone(),
            session: session_config.clone(),
            policy: policy.clone(),
            format,
        };
        let paths = start_run(&ctx)?;
        init_logging(Some(&paths.logs_path))?;
        Some((ctx, paths))
    } else {
        init_logging(None)?;
        if cli.format.is_some() {
            tracing::warn!(event = "format_ignored", "--format only applies with --save");
        }
        None
    };

    tracing::info!(event = "run_started", target = %target, count, save = cli.save);
    let timer = Instant::now();

    let result: Result<(), CliError> = async {
        let source = JsonDocumentSource::new(&cli.schema);
        let catalog = source.load().await?;
        let fingerprint = catalog.fingerprint()?;
        tracing::info!(
            event = "catalog_loaded",
            models = catalog.models.len(),
            fingerprint = %fingerprint
        );

        let session = GenerationSession::new(session_config)
            .with_policy(policy)
            .with_overrides(overrides);
        let outcome: GenerationOutcome = match &cli.model {
            Some(path) => {
                let model = catalog.resolve_model_by_path(path)?;
                session.generate(&catalog, model, count)?
            }
            None => session.generate_for_all(&catalog, cli.app.as_deref(), count, &cli.exclude)?,
        };
        for warning in &outcome.report.warnings {
            tracing::warn!(event = "generation_warning", warning = %warning);
        }

        let Some((ctx, paths)) = &run else {
            let document = batch_to_json(&outcome.batch)?;
            let rendered =
                serde_json::to_string_pretty(&document).map_err(GenerationError::from)?;
            println!("{rendered}");
            return Ok(());
        };

        let mut adapter = JsonLinesAdapter::create(&paths.instances_path)?;
        let handles = session.persist(&outcome, &mut adapter).await?;
        let outputs = write_outputs(paths, &catalog, &outcome.batch, ctx.format)?;
        for path in &outputs {
            tracing::info!(event = "output_written", path = %path.display());
        }

        let summary = RunSummary {
            run_id: &ctx.run_id,
            status: "success",
            catalog_fingerprint: &fingerprint,
            duration_ms: timer.elapsed().as_millis(),
            persisted: handles.len(),
            outputs: outputs
                .iter()
                .filter_map(|path| path.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect(),
            report: &outcome.report,
        };
        write_summary(paths, &summary)?;
        tracing::info!(
            event = "run_finished",
            status = "success",
            duration_ms = summary.duration_ms,
            seed = outcome.report.seed
        );
        println!("{}", paths.root.display());
        Ok(())
    }
    .await;

    // A started run directory always ends with a report.json.
    if let (Err(err), Some((ctx, paths))) = (&result, &run) {
        let failure = RunFailure {
            run_id: &ctx.run_id,
            status: "failed",
            kind: err.kind(),
            error: err.to_string(),
            duration_ms: timer.elapsed().as_millis(),
        };
        if let Err(write_err) = write_failure(paths, &failure) {
            tracing::error!(event = "report_write_failed", error = %write_err);
        }
    }
    result
}

fn parse_overrides(assignments: &[String]) -> Result<Overrides, CliError> {
    let mut overrides = Overrides::new();
    for assignment in assignments {
        let (key, value) =
            Overrides::parse_assignment(assignment).map_err(CliError::InvalidConfig)?;
        overrides.set(key, value);
    }
    Ok(overrides)
}
