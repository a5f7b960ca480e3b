mod report;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::runtime::Runtime;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use newscheck_agents::{NewsVerifier, VerificationReport};
use newscheck_core::metrics::init_metrics_from_env;
use newscheck_core::{
    Article, Config, ConfigLoader, DisabledSearch, PriorAnalysis, ScriptedGenerator,
    TelemetryOptions, init_telemetry, optional_env, persist_trace,
};

#[derive(Parser, Debug)]
#[command(
    name = "newscheck",
    version,
    about = "Multi-agent news verification"
)]
struct Cli {
    /// Path to a TOML configuration file (defaults to NEWSCHECK_CONFIG, then ./newscheck.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `newscheck_agents=trace`.
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a single article.
    Verify(VerifyArgs),
    /// Verify every JSON article under a directory.
    Batch(BatchArgs),
    /// Print the resolved configuration.
    Config,
}

#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// Verification language (`it` or `en`); overrides the configuration.
    #[arg(long)]
    language: Option<String>,

    /// Emit JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Print the state-transition trace after the verdict.
    #[arg(long)]
    trace: bool,

    /// Directory where each request's trace is written as JSON.
    #[arg(long)]
    trace_dir: Option<PathBuf>,

    /// Dry run without the generative and search services.
    #[arg(long)]
    offline: bool,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Article JSON file; replaces the individual article flags.
    #[arg(long, conflicts_with_all = ["title", "content", "summary"])]
    article: Option<PathBuf>,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    content: Option<String>,

    #[arg(long)]
    summary: Option<String>,

    #[arg(long)]
    source: Option<String>,

    #[arg(long)]
    date: Option<String>,

    #[arg(long)]
    author: Option<String>,

    #[arg(long)]
    link: Option<String>,

    /// Prior critical analysis as JSON; skips the analyst step.
    #[arg(long)]
    analysis: Option<PathBuf>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Directory walked recursively for `*.json` articles.
    #[arg(long)]
    dir: PathBuf,

    #[command(flatten)]
    output: OutputArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load(cli.config.clone())?;

    init_telemetry(
        TelemetryOptions::default()
            .with_default_level(config.logging.level.clone())
            .with_env_filter(cli.log.clone()),
    )?;
    init_metrics_from_env("newscheck");

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Verify(args) => verify_command(args, config).await?,
            Command::Batch(args) => batch_command(args, config).await?,
            Command::Config => config_command(&config)?,
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

fn build_verifier(mut config: Config, output: &OutputArgs) -> Result<NewsVerifier> {
    if let Some(language) = &output.language {
        config.verification.language = language.clone();
    }
    if output.offline {
        warn!("offline mode: generative and search services disabled");
        return Ok(NewsVerifier::new(
            Arc::new(ScriptedGenerator::new()),
            Arc::new(DisabledSearch),
            &config,
        ));
    }
    Ok(NewsVerifier::from_config(&config)?)
}

async fn verify_command(args: VerifyArgs, config: Config) -> Result<()> {
    let article = match &args.article {
        Some(path) => load_json::<Article>(path)?,
        None => article_from_flags(&args)?,
    };
    let analysis = args
        .analysis
        .as_deref()
        .map(load_json::<PriorAnalysis>)
        .transpose()?;

    let verifier = build_verifier(config, &args.output)?;
    info!(title = %article.title, "verifying article");
    let report = verifier.verify(&article, analysis).await;

    let request_id = args
        .article
        .as_deref()
        .and_then(file_stem)
        .unwrap_or_else(|| format!("verify-{}", Uuid::new_v4()));
    persist(&args.output, &request_id, &report)?;

    if args.output.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report, args.output.trace);
    }
    Ok(())
}

#[derive(Serialize)]
struct BatchEntry {
    file: String,
    #[serde(flatten)]
    report: VerificationReport,
}

async fn batch_command(args: BatchArgs, config: Config) -> Result<()> {
    let files = collect_articles(&args.dir);
    if files.is_empty() {
        info!(dir = %args.dir.display(), "no article files found");
        return Ok(());
    }

    let verifier = build_verifier(config, &args.output)?;
    let mut entries = Vec::with_capacity(files.len());
    for file in files {
        let article = match load_json::<Article>(&file) {
            Ok(article) => article,
            Err(err) => {
                warn!(file = %file.display(), error = %err, "skipping unreadable article");
                continue;
            }
        };
        info!(file = %file.display(), title = %article.title, "verifying article");
        let report = verifier.verify(&article, None).await;

        let request_id = file_stem(&file).unwrap_or_else(|| Uuid::new_v4().to_string());
        persist(&args.output, &request_id, &report)?;

        if args.output.json {
            entries.push(BatchEntry {
                file: file.display().to_string(),
                report,
            });
        } else {
            println!("== {}", file.display());
            print_text(&report, args.output.trace);
        }
    }

    if args.output.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    }
    Ok(())
}

fn config_command(config: &Config) -> Result<()> {
    println!("{}", toml::to_string_pretty(config)?);

    let search_env = config.search.resolved_api_key_env();
    println!("# secrets");
    println!("# {} = {}", config.llm.api_key_env, secret_status(&config.llm.api_key_env));
    if !search_env.is_empty() {
        println!("# {search_env} = {}", secret_status(&search_env));
    }
    Ok(())
}

fn secret_status(var: &str) -> &'static str {
    if optional_env(var).is_some() { "set" } else { "missing" }
}

fn article_from_flags(args: &VerifyArgs) -> Result<Article> {
    let Some(title) = args.title.clone().filter(|t| !t.trim().is_empty()) else {
        bail!("either --article or --title is required");
    };
    Ok(Article {
        title,
        content: args.content.clone(),
        summary: args.summary.clone(),
        source: args.source.clone().unwrap_or_default(),
        date: args.date.clone(),
        author: args.author.clone(),
        link: args.link.clone(),
    })
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn collect_articles(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")))
        .collect();
    files.sort();
    files
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|stem| stem.to_string_lossy().into_owned())
}

fn persist(output: &OutputArgs, request_id: &str, report: &VerificationReport) -> Result<()> {
    if let Some(dir) = &output.trace_dir {
        let path = persist_trace(dir, request_id, &report.verdict.trace)?;
        info!(path = %path.display(), "trace written");
    }
    Ok(())
}

fn print_text(report: &VerificationReport, with_trace: bool) {
    println!("{}", report::render_text(report));
    if with_trace {
        println!("{}", report::render_trace(report));
    }
}
