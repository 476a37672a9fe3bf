//! Incident memory CLI
//!
//! The `incident` command reports and resolves incidents, surfacing the
//! resolutions of similar past incidents.
//!
//! ## Commands
//!
//! - `report`: Record a new incident and list known resolutions for similar ones
//! - `resolve`: Attach a resolution to an incident (by id or by description)
//! - `similar`: Look up resolutions for a description without recording it
//! - `show`: Print a single incident

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use incident_memory::{
    init_tracing, AmbiguityPolicy, CreatedIncident, Embedder, EmbeddingConfig, EngineConfig,
    GeminiEmbedder, IncidentLifecycle, ResolvedIncident, ResolvedMatch, RetrievalPolicy,
};
use incident_state::{Incident, IncidentId, SurrealHandle};
use serde::Serialize;
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "incident")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Incident memory: recall how similar incidents were resolved", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Output format for command results
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Maximum cosine distance for a match
    #[arg(long, global = true, env = "INCIDENT_MAX_DISTANCE", default_value_t = 0.30)]
    max_distance: f32,

    /// Maximum number of similar incidents considered
    #[arg(long, global = true, env = "INCIDENT_MATCH_LIMIT", default_value_t = 5)]
    limit: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Report a new incident
    Report {
        /// Free-text description of what is going wrong
        description: String,
    },

    /// Resolve an incident
    Resolve {
        /// Incident id returned by `report`
        #[arg(long, conflicts_with = "description", required_unless_present = "description")]
        id: Option<String>,

        /// Exact description the incident was reported with
        #[arg(long)]
        description: Option<String>,

        /// Resolve every incident sharing the description instead of refusing
        #[arg(long, requires = "description")]
        apply_to_all: bool,

        /// How the incident was resolved
        resolution: String,
    },

    /// Show resolutions of incidents similar to a description
    Similar {
        description: String,
    },

    /// Show a single incident
    Show {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let retrieval = RetrievalPolicy::new(cli.max_distance, cli.limit)
        .context("Invalid retrieval settings")?;
    let embedding = EmbeddingConfig::from_env().context("Invalid embedding settings")?;

    let handle = SurrealHandle::connect_from_env()
        .await
        .context("Failed to connect to incident database")?;

    let apply_to_all = matches!(
        cli.command,
        Commands::Resolve {
            apply_to_all: true,
            ..
        }
    );
    let engine = EngineConfig::default()
        .with_retrieval(retrieval)
        .with_ambiguity(if apply_to_all {
            AmbiguityPolicy::ApplyToAll
        } else {
            AmbiguityPolicy::Reject
        });
    let lifecycle = build_lifecycle(&handle, embedding, engine);

    let output = match cli.command {
        Commands::Report { description } => cmd_report(&lifecycle, &description, cli.format).await,
        Commands::Resolve {
            id,
            description,
            resolution,
            ..
        } => {
            cmd_resolve(
                &lifecycle,
                id.as_deref(),
                description.as_deref(),
                &resolution,
                cli.format,
            )
            .await
        }
        Commands::Similar { description } => {
            cmd_similar(&lifecycle, &description, cli.format).await
        }
        Commands::Show { id } => cmd_show(&lifecycle, &id, cli.format).await,
    }?;

    println!("{}", output);
    Ok(())
}

fn build_lifecycle(
    handle: &SurrealHandle,
    embedding: EmbeddingConfig,
    engine: EngineConfig,
) -> IncidentLifecycle {
    let dimension = embedding.dimension;
    let embedder = GeminiEmbedder::new(embedding);
    if !embedder.is_enabled() {
        debug!("GEMINI_API_KEY not set; similar-incident lookup disabled");
    }
    IncidentLifecycle::new(
        Arc::new(handle.incident_store()),
        Arc::new(handle.vector_index(dimension)),
        Arc::new(embedder),
        engine,
    )
}

async fn cmd_report(
    lifecycle: &IncidentLifecycle,
    description: &str,
    format: OutputFormat,
) -> Result<String> {
    let created = lifecycle
        .create(description)
        .await
        .context("Failed to report incident")?;
    render(&created, format, render_created_text)
}

async fn cmd_resolve(
    lifecycle: &IncidentLifecycle,
    id: Option<&str>,
    description: Option<&str>,
    resolution: &str,
    format: OutputFormat,
) -> Result<String> {
    let resolved = match (id, description) {
        (Some(id), _) => vec![lifecycle.resolve(&IncidentId::from(id), resolution).await?],
        (None, Some(description)) => {
            lifecycle
                .resolve_by_description(description, resolution)
                .await?
        }
        (None, None) => anyhow::bail!("Either --id or --description is required"),
    };
    render(&resolved, format, |r| render_resolved_text(r))
}

async fn cmd_similar(
    lifecycle: &IncidentLifecycle,
    description: &str,
    format: OutputFormat,
) -> Result<String> {
    let matches = lifecycle.similar(description).await;
    render(&matches, format, |m| render_matches_text(m))
}

async fn cmd_show(lifecycle: &IncidentLifecycle, id: &str, format: OutputFormat) -> Result<String> {
    let incident = lifecycle.get(&IncidentId::from(id)).await?;
    render(&incident, format, render_incident_text)
}

fn render<T: Serialize + ?Sized>(
    value: &T,
    format: OutputFormat,
    text: impl Fn(&T) -> String,
) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Text => Ok(text(value)),
    }
}

fn render_created_text(created: &CreatedIncident) -> String {
    let mut out = format!("Reported incident {}\n", created.incident.id);
    if created.similar_resolutions.is_empty() {
        out.push_str("No similar resolved incidents.");
    } else {
        out.push_str("Similar incidents were resolved by:\n");
        for resolution in &created.similar_resolutions {
            out.push_str(&format!("  - {}\n", resolution));
        }
    }
    out.trim_end().to_string()
}

fn render_resolved_text(resolved: &[ResolvedIncident]) -> String {
    resolved
        .iter()
        .map(|r| {
            let memory = if r.memory_written {
                "remembered"
            } else {
                "not remembered"
            };
            format!("Resolved incident {} ({})", r.incident.id, memory)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_matches_text(matches: &[ResolvedMatch]) -> String {
    if matches.is_empty() {
        return "No similar resolved incidents.".to_string();
    }
    matches
        .iter()
        .map(|m| format!("{:.3}  {}  (from {})", m.similarity, m.resolution, m.incident_id))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_incident_text(incident: &Incident) -> String {
    format!(
        "incident {}\nStatus:     {:?}\nReported:   {}\nUpdated:    {}\n\n    {}\n\nResolution: {}",
        incident.id,
        incident.status(),
        incident.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        incident.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        incident.description,
        incident.resolution_text().unwrap_or("(none)"),
    )
}
