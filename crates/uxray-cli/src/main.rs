//! `uxray` command line
//!
//! Offline entry points over the pipeline: extract findings from a critique,
//! correlate a recorded synthesizer response, replay chart generation into a
//! store, list stored charts, and replay a recorded web-metrics fetch.

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uxray_artifact::{SubjectId, TenantId};
use uxray_core::{
    prompts, BackendError, ChartPipeline, GenerativeBackend, MetricMap, MetricsSource, PayloadPart,
    PipelineConfig, RawEvidence, ReportService, VisualizationSynthesizer, WebMetricsRequest,
};
use uxray_findings::{correlate_with, CorrelationPolicy, FindingExtractor};

/// Backend that answers from recorded responses
#[derive(Debug)]
struct ReplayBackend {
    critique: Option<String>,
    charts: String,
}

#[async_trait::async_trait]
impl GenerativeBackend for ReplayBackend {
    async fn invoke(&self, system: &str, _payload: &[PayloadPart]) -> Result<String, BackendError> {
        if system == prompts::CHART_SYSTEM {
            return Ok(self.charts.clone());
        }
        match (&self.critique, system == prompts::BEHAVIOR_SYSTEM) {
            (Some(critique), true) => Ok(critique.clone()),
            _ => Err(BackendError::Rejected("no recorded response for this prompt".into())),
        }
    }
}

/// Metrics source that answers every URL with one recorded map
#[derive(Debug)]
struct RecordedMetrics(MetricMap);

#[async_trait::async_trait]
impl MetricsSource for RecordedMetrics {
    async fn fetch(&self, _url: &str) -> Result<MetricMap, BackendError> {
        Ok(self.0.clone())
    }
}

fn cli() -> Command {
    let config = Arg::new("config")
        .long("config")
        .value_parser(value_parser!(PathBuf))
        .help("Pipeline configuration (TOML)");

    Command::new("uxray")
        .version(uxray_core::VERSION)
        .about("UX-Ray derived-artifact pipeline")
        .subcommand_required(true)
        .arg(config.global(true))
        .subcommand(
            Command::new("extract")
                .about("Print the findings of a critique as JSON")
                .arg(
                    Arg::new("critique")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Critique text file"),
                ),
        )
        .subcommand(
            Command::new("correlate")
                .about("Pair findings with a recorded synthesizer response")
                .arg(Arg::new("critique").required(true).value_parser(value_parser!(PathBuf)))
                .arg(Arg::new("response").required(true).value_parser(value_parser!(PathBuf)))
                .arg(
                    Arg::new("policy")
                        .long("policy")
                        .value_parser(["positional", "index-echoing"])
                        .help("Override the configured correlation policy"),
                ),
        )
        .subcommand(
            Command::new("charts")
                .about("Replay chart generation for an upload into the store")
                .arg(Arg::new("tenant").long("tenant").required(true))
                .arg(Arg::new("subject").long("subject").required(true))
                .arg(
                    Arg::new("evidence")
                        .long("evidence")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Raw evidence file (csv, json or text)"),
                )
                .arg(
                    Arg::new("response")
                        .long("response")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Recorded synthesizer response"),
                )
                .arg(
                    Arg::new("critique")
                        .long("critique")
                        .value_parser(value_parser!(PathBuf))
                        .help("Recorded critique; required unless one is already stored"),
                ),
        )
        .subcommand(
            Command::new("metrics")
                .about("Store a web-metrics report from a recorded metric map")
                .arg(Arg::new("tenant").long("tenant").required(true))
                .arg(Arg::new("subject").long("subject").required(true))
                .arg(Arg::new("url").long("url").required(true))
                .arg(Arg::new("label").long("label").required(true))
                .arg(
                    Arg::new("recorded")
                        .long("recorded")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON object of metric name to display value"),
                ),
        )
        .subcommand(
            Command::new("list")
                .about("List stored chart specs for an upload")
                .arg(Arg::new("tenant").required(true))
                .arg(Arg::new("subject").required(true)),
        )
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn load_config(matches: &ArgMatches) -> Result<PipelineConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => PipelineConfig::load(path)
            .await
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(PipelineConfig::new()),
    }
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

fn ids(args: &ArgMatches) -> Result<(TenantId, SubjectId)> {
    let tenant = args.get_one::<String>("tenant").map(String::as_str).unwrap_or_default();
    let subject = args.get_one::<String>("subject").map(String::as_str).unwrap_or_default();
    Ok((TenantId::new(tenant)?, SubjectId::new(subject)?))
}

fn path_arg<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a PathBuf> {
    match args.get_one::<PathBuf>(name) {
        Some(path) => Ok(path),
        None => bail!("missing argument `{name}`"),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(matches: ArgMatches) -> Result<()> {
    let config = load_config(&matches).await?;

    match matches.subcommand() {
        Some(("extract", args)) => {
            let critique = read_text(path_arg(args, "critique")?).await?;
            let findings = FindingExtractor::new(config.extractor_options()).extract(&critique)?;
            print_json(&findings)
        }
        Some(("correlate", args)) => {
            let critique = read_text(path_arg(args, "critique")?).await?;
            let response = read_text(path_arg(args, "response")?).await?;
            let policy = match args.get_one::<String>("policy").map(String::as_str) {
                Some("positional") => CorrelationPolicy::Positional,
                Some(_) => CorrelationPolicy::IndexEchoing,
                None => config.correlation,
            };

            let findings = FindingExtractor::new(config.extractor_options()).extract(&critique)?;
            let pairs = correlate_with(policy, &findings, &response)?;
            print_json(&pairs)
        }
        Some(("charts", args)) => {
            let (tenant, upload) = ids(args)?;
            let evidence = RawEvidence::load(path_arg(args, "evidence")?, config.max_evidence_bytes).await?;
            let critique = match args.get_one::<PathBuf>("critique") {
                Some(path) => Some(read_text(path).await?),
                None => None,
            };
            let backend: Arc<dyn GenerativeBackend> = Arc::new(ReplayBackend {
                critique,
                charts: read_text(path_arg(args, "response")?).await?,
            });

            let manager = Arc::new(config.build_manager());
            let reports = ReportService::new(Arc::clone(&backend), manager);
            let pipeline = ChartPipeline::new(config, reports, VisualizationSynthesizer::new(backend));

            match pipeline.charts(&tenant, &upload, &evidence).await {
                Ok(charts) => print_json(&charts),
                Err(e) => {
                    eprintln!("{}", serde_json::to_string_pretty(&e.report())?);
                    Err(e.into())
                }
            }
        }
        Some(("metrics", args)) => {
            let (tenant, page) = ids(args)?;
            let recorded = read_text(path_arg(args, "recorded")?).await?;
            let metrics: MetricMap =
                serde_json::from_str(&recorded).context("recorded metrics must be a JSON object of strings")?;
            let request = WebMetricsRequest::new(
                args.get_one::<String>("url").cloned().unwrap_or_default(),
                args.get_one::<String>("label").cloned().unwrap_or_default(),
            );

            let backend: Arc<dyn GenerativeBackend> = Arc::new(ReplayBackend {
                critique: None,
                charts: String::new(),
            });
            let lookup = config.metrics_lookup(Arc::new(RecordedMetrics(metrics)));
            let reports = ReportService::new(backend, Arc::new(config.build_manager())).with_metrics(lookup);

            let artifact = reports.web_metrics(&tenant, &page, &request).await?;
            print_json(artifact.payload())
        }
        Some(("list", args)) => {
            let (tenant, upload) = ids(args)?;
            let charts = config.build_manager().list_chart_specs(&tenant, &upload).await?;
            print_json(&charts)
        }
        Some((other, _)) => bail!("unknown subcommand `{other}`"),
        None => bail!("no subcommand given"),
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run(cli().get_matches()).await {
        tracing::error!(error = %e, "command failed");
        std::process::exit(1);
    }
}
