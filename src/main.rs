use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use minutes_engine::{
    parse_agenda_file, parse_catalog_file, parse_fragments_file, AnthropicClient, AnthropicConfig,
    Drafter, EngineConfig, EngineError, ExtractiveDrafter, HumanMinutes, MinutesEngine,
    MinutesReport, TemplateCatalog,
};

#[derive(Parser)]
#[command(name = "minutes-engine")]
#[command(author, version, about = "Agenda-driven meeting minutes from transcript fragments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check an agenda file without running a meeting
    Validate {
        /// Agenda submission file (JSON)
        #[arg(short, long)]
        agenda: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Replay a transcript against an agenda and write the minutes
    Run {
        /// Agenda submission file (JSON)
        #[arg(short, long)]
        agenda: PathBuf,

        /// Transcript file: fragment list or Deepgram JSON
        #[arg(short, long)]
        transcript: PathBuf,

        /// Output file for the machine-readable report (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Output file for human-readable minutes (Markdown)
        #[arg(long)]
        markdown: Option<PathBuf>,

        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Action template catalog (JSON), replaces the built-in one
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Fragments ingested per synthesis round
        #[arg(long, default_value = "8")]
        batch_size: usize,

        /// Draft offline without calling the Anthropic API
        #[arg(long)]
        offline: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the action templates
    Templates {
        /// Action template catalog (JSON)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { agenda, verbose } => {
            setup_logging(verbose);
            validate(&agenda)
        }
        Commands::Run {
            agenda,
            transcript,
            output,
            markdown,
            config,
            catalog,
            batch_size,
            offline,
            verbose,
        } => {
            setup_logging(verbose);
            run(
                &agenda,
                &transcript,
                &output,
                markdown.as_deref(),
                config.as_deref(),
                catalog.as_deref(),
                batch_size,
                offline,
            )
            .await
        }
        Commands::Templates { catalog } => {
            setup_logging(false);
            list_templates(catalog.as_deref())
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_catalog(path: Option<&Path>) -> Result<TemplateCatalog> {
    match path {
        Some(path) => parse_catalog_file(path).context("Failed to load template catalog"),
        None => Ok(TemplateCatalog::builtin()),
    }
}

fn validate(agenda: &Path) -> Result<()> {
    let submission = parse_agenda_file(agenda).context("Failed to parse agenda")?;

    match minutes_engine::engine::validate_agenda(&submission, &Default::default()) {
        Ok(agenda) => {
            println!("Agenda OK: {} item(s)", agenda.items.len());
            for item in &agenda.items {
                println!("  {}. {} [{}] ({})", item.ordinal + 1, item.title, item.status, item.id);
                for goal in &item.goals {
                    println!("     - {}", goal.condition);
                }
            }
            Ok(())
        }
        Err(EngineError::InvalidAgenda(violations)) => {
            println!("Agenda rejected: {} violation(s)", violations.len());
            for violation in &violations {
                println!("  {}", violation);
            }
            anyhow::bail!("invalid agenda")
        }
        Err(e) => Err(e.into()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    agenda: &Path,
    transcript: &Path,
    output: &Path,
    markdown: Option<&Path>,
    config: Option<&Path>,
    catalog: Option<&Path>,
    batch_size: usize,
    offline: bool,
) -> Result<()> {
    let config = match config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let catalog = load_catalog(catalog)?;

    let drafter: Arc<dyn Drafter> = if offline {
        info!("Drafting offline");
        Arc::new(ExtractiveDrafter::default())
    } else {
        let api_config = AnthropicConfig::from_env()?;
        Arc::new(AnthropicClient::new(api_config))
    };

    info!("Loading agenda from {:?}", agenda);
    let submission = parse_agenda_file(agenda).context("Failed to parse agenda")?;

    info!("Loading transcript from {:?}", transcript);
    let fragments = parse_fragments_file(transcript, config.segmenter.max_gap_ms)
        .context("Failed to parse transcript")?;
    info!("Loaded {} fragments", fragments.len());

    let engine = MinutesEngine::new(config, drafter, Arc::new(catalog));
    let session = engine.open_session();

    let agenda = engine.submit_agenda(&session, &submission).await?;
    info!("Agenda v{}: {} item(s)", agenda.version, agenda.items.len());

    let mut failures = 0;
    for (round, batch) in fragments.chunks(batch_size.max(1)).enumerate() {
        let report = engine.ingest(&session, batch.to_vec()).await?;
        info!(
            "Round {}: {} accepted, {} duplicate(s), {} overlap warning(s), {} pass(es) applied",
            round + 1,
            report.accepted,
            report.duplicates,
            report.warnings.len(),
            report.synthesis.applied()
        );
        for rejected in &report.rejected {
            warn!("Round {}: fragment #{} rejected: {}", round + 1, rejected.index, rejected.error);
        }
        failures += report.synthesis.failures.len();
    }

    let suggestions = engine.suggest(&session).await?;
    let snapshot = engine.snapshot(&session).await?;
    engine.close_session(&session)?;

    let report = MinutesReport::new(snapshot, suggestions);
    report.write_json(output)?;
    info!("Report written to {:?}", output);

    if let Some(path) = markdown {
        HumanMinutes::new(&report).write_file(path)?;
        info!("Minutes written to {:?}", path);
    }

    info!(
        "Complete: {} entries ({} stale), {} suggestion(s), {} failed pass(es)",
        report.metadata.entries,
        report.metadata.stale_entries,
        report.suggestions.len(),
        failures
    );

    Ok(())
}

fn list_templates(catalog: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(catalog)?;

    println!("Action Templates");
    println!("================");
    for template in catalog.templates() {
        let phrases: Vec<&str> = template.triggers.iter().map(|t| t.phrase.as_str()).collect();
        println!(
            "{} ({}), threshold {:.2}: {}",
            template.id,
            template.label,
            template.threshold,
            phrases.join(", ")
        );
    }

    Ok(())
}
