//! Sentient agent client - command line entry point

use clap::{Parser, Subcommand, ValueEnum};
use schemars::schema_for;
use sentient_agent_client::client::AgentClient;
use sentient_agent_client::config::ClientConfig;
use sentient_agent_client::error::{ClientError, ClientResult};
use sentient_agent_client::ledger::SessionLedger;
use sentient_agent_client::observability::init_default_logging;
use sentient_agent_client::protocol::{
    CapabilityEnvelope, Query, RequestBody, ResponseEvent, Session, TextStreamAssembler,
};
use sentient_agent_client::transport::HttpTransport;
use sentient_agent_client::validation::{ValidationContext, ValidationFailure};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{error, info};

/// Typed event-stream client for remote agents
#[derive(Parser)]
#[command(name = "sentient-client")]
#[command(about = "Query an agent and validate its event stream")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a prompt and print the validated response events
    Query {
        prompt: String,
        /// Capability name for a structured request payload
        #[arg(long, requires = "payload")]
        capability: Option<String>,
        /// Request payload as JSON
        #[arg(long, requires = "capability")]
        payload: Option<String>,
        /// Print every event as a JSON line instead of rendered text
        #[arg(long)]
        json: bool,
    },
    /// Validate a JSON file against one of the protocol schemas
    Validate {
        file: PathBuf,
        #[arg(long, value_enum)]
        schema: SchemaKind,
    },
    /// Print a protocol JSON Schema
    Schema {
        #[arg(value_enum)]
        name: SchemaKind,
    },
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaKind {
    ResponseEvent,
    Session,
    Query,
    RequestBody,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    let result = match cli.command {
        Commands::Query {
            prompt,
            capability,
            payload,
            json,
        } => match load_configuration(cli.config.as_deref()) {
            Ok((config, base_dir)) => {
                run_query(config, &base_dir, &prompt, capability, payload, json).await
            }
            Err(e) => Err(e),
        },
        Commands::Validate { file, schema } => validate_file(&file, schema),
        Commands::Schema { name } => print_schema(name),
        Commands::Config { show } => load_configuration(cli.config.as_deref())
            .and_then(|(config, _)| handle_config_command(&config, show)),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        eprintln!("error: {e}");
        if let ClientError::Validation(failure) = &e {
            print_field_errors(failure);
        }
        process::exit(1);
    }
}

/// Load the explicit config or the first default path that exists
fn load_configuration(config_path: Option<&Path>) -> ClientResult<(ClientConfig, PathBuf)> {
    let path = match config_path {
        Some(path) => path,
        None => ClientConfig::find_default().ok_or_else(|| {
            ClientError::invalid_input(
                "No configuration file found. Provide one with -c/--config or create sentient.toml",
            )
        })?,
    };

    info!("Loading configuration from: {}", path.display());
    let config = ClientConfig::load_from_file(path)?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok((config, base_dir))
}

async fn run_query(
    config: ClientConfig,
    base_dir: &Path,
    prompt: &str,
    capability: Option<String>,
    payload: Option<String>,
    json: bool,
) -> ClientResult<()> {
    let registry = config.capability_registry(base_dir)?;
    let context = Arc::new(ValidationContext::with_capabilities(registry));
    let transport = HttpTransport::new(config.transport_config()?)?;
    let ledger = SessionLedger::new(config.session.processor_id.clone());
    let client = AgentClient::new(transport, context, ledger, config.client.sender.clone())
        .with_framing_policy(config.framing_policy());

    let query = match (capability, payload) {
        (Some(capability), Some(payload)) => {
            let payload = serde_json::from_str(&payload)
                .map_err(|e| ClientError::invalid_input(format!("--payload is not JSON: {e}")))?;
            Query::new(prompt).with_capability(CapabilityEnvelope::new(capability, payload))
        }
        _ => Query::new(prompt),
    };

    let mut stream = client.send(query).await?;
    let mut assembler = TextStreamAssembler::new();
    let mut stdout = std::io::stdout();

    while let Some(event) = stream.next_event().await? {
        if json {
            println!("{}", serde_json::to_string(&event)?);
            continue;
        }

        match &event {
            ResponseEvent::Document(document) => {
                println!("[{}]", document.event_name);
                println!("{}", serde_json::to_string_pretty(&document.content)?);
            }
            ResponseEvent::TextBlock(block) => {
                println!("[{}] {}", block.event_name, block.content);
            }
            ResponseEvent::TextChunk(chunk) => {
                print!("{}", chunk.content);
                let _ = stdout.flush();
                let progress = assembler
                    .push(chunk)
                    .map_err(|e| ClientError::internal(e.to_string()))?;
                if progress.complete {
                    println!();
                }
            }
            ResponseEvent::Error(event) => {
                eprintln!(
                    "[{}] agent error {}: {}",
                    event.event_name, event.content.error_code, event.content.error_message
                );
            }
            ResponseEvent::Done(_) => break,
        }
    }

    info!(
        events = stream.events_yielded(),
        skipped_frames = stream.frames_skipped(),
        "Response finished"
    );
    Ok(())
}

fn validate_file(file: &Path, schema: SchemaKind) -> ClientResult<()> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| ClientError::invalid_input(format!("{}: {e}", file.display())))?;
    let context = ValidationContext::new();
    let label = file.display().to_string();

    match schema {
        SchemaKind::ResponseEvent => {
            let raw = serde_json::from_str(&text)?;
            context.validate_response_event(&raw, Some(&label))?;
        }
        SchemaKind::Session => {
            context.validate_json::<Session>(&text, "Session", Some(&label))?;
        }
        SchemaKind::Query => {
            context.validate_json::<Query>(&text, "Query", Some(&label))?;
        }
        SchemaKind::RequestBody => {
            context.validate_json::<RequestBody>(&text, "RequestBody", Some(&label))?;
        }
    }

    println!("{}: valid {:?}", file.display(), schema);
    Ok(())
}

fn print_schema(name: SchemaKind) -> ClientResult<()> {
    let schema = match name {
        SchemaKind::ResponseEvent => schema_for!(ResponseEvent),
        SchemaKind::Session => schema_for!(Session),
        SchemaKind::Query => schema_for!(Query),
        SchemaKind::RequestBody => schema_for!(RequestBody),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn handle_config_command(config: &ClientConfig, show: bool) -> ClientResult<()> {
    println!("Configuration is valid");
    if show {
        println!("{}", serde_json::to_string_pretty(config)?);
    }
    Ok(())
}

fn print_field_errors(failure: &ValidationFailure) {
    for (path, messages) in &failure.field_errors {
        for message in messages {
            eprintln!("  {path}: {message}");
        }
    }
}
