//! pixelpipe - CLI entry point

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pixelpipe_agent::{AgentConfig, Classification, HumanDecision, Pipeline, PipelineSnapshot};
use pixelpipe_core::EngineStatus;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const RULE: &str = "==================================================";

/// Route screenshots through classification, human review and action
#[derive(Parser, Debug)]
#[command(name = "pixelpipe", version, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process one screenshot, pausing for approval before acting
    Run {
        /// Screenshot to process (prompted for when omitted)
        #[arg(value_name = "IMAGE")]
        image: Option<PathBuf>,

        /// Session identifier (random when omitted)
        #[arg(long)]
        session_id: Option<String>,

        /// Vision model (overrides PIXELPIPE_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// Ollama server URL (overrides PIXELPIPE_OLLAMA_URL)
        #[arg(long)]
        ollama_url: Option<String>,

        /// Approve without prompting
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the pipeline graph as a Mermaid flowchart
    Graph,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Run {
            image,
            session_id,
            model,
            ollama_url,
            yes,
        } => {
            let mut config = AgentConfig::from_env()?;
            if let Some(model) = model {
                config = config.with_model(model);
            }
            if let Some(url) = ollama_url {
                config = config.with_ollama_url(url);
            }
            let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
            run(config, image, &session_id, yes).await
        }
        Command::Graph => {
            let pipeline = Pipeline::from_config(&AgentConfig::from_env()?)?;
            print!("{}", pipeline.describe());
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(
    config: AgentConfig,
    image: Option<PathBuf>,
    session_id: &str,
    auto_approve: bool,
) -> anyhow::Result<()> {
    let image = match image {
        Some(image) => image,
        None => PathBuf::from(clean_path(&prompt("Enter screenshot filename: ").await?)),
    };
    if !tokio::fs::try_exists(&image).await.unwrap_or(false) {
        bail!("File not found: {}", image.display());
    }

    let pipeline = Pipeline::from_config(&config).context("Failed to configure pipeline")?;

    println!("{RULE}");
    println!("STARTING PIXELPIPE");
    println!("{RULE}");
    info!(session_id = %session_id, image = %image.display(), "Processing screenshot");

    let snapshot = pipeline
        .start_session(session_id, image.to_string_lossy().into_owned())
        .await?;
    if snapshot.status == EngineStatus::Failed {
        bail!(
            "Workflow failed before reaching checkpoint: {}",
            snapshot.error.as_deref().unwrap_or("unknown error")
        );
    }

    let state = &snapshot.state;
    let (Some(classification), Some(data)) = (state.classification, state.extracted_data.as_ref())
    else {
        println!("\nCould not classify image. Try a clearer screenshot.");
        return Ok(());
    };
    if classification == Classification::Unknown {
        println!("\nCould not classify image. Try a clearer screenshot.");
        return Ok(());
    }

    println!("\n[CHECKPOINT] extracted ({classification}):");
    println!("{}", serde_json::to_string_pretty(data)?);

    let decision = if auto_approve {
        HumanDecision::Approved
    } else {
        HumanDecision::from_input(
            &prompt("\nType 'APPROVED' to execute action, or press Enter to cancel: ").await?,
        )
    };
    pipeline.submit_decision(session_id, decision).await?;

    match decision {
        HumanDecision::Approved => println!("\nResuming..."),
        HumanDecision::Rejected => println!("Action cancelled."),
    }
    let done = pipeline.resume(session_id).await?;
    report(&done)
}

fn report(snapshot: &PipelineSnapshot) -> anyhow::Result<()> {
    match snapshot.status {
        EngineStatus::Done => {}
        EngineStatus::Failed => bail!(
            "Workflow failed: {}",
            snapshot.error.as_deref().unwrap_or("unknown error")
        ),
        status => bail!("Workflow stopped in unexpected status {status}"),
    }

    match &snapshot.state.action_result {
        Some(result) if result.is_success() => println!("\nPIXELPIPE COMPLETE"),
        Some(result) => bail!("Action failed: {result:?}"),
        None => {}
    }
    Ok(())
}

/// Strip surrounding whitespace and the quotes a drag-and-drop adds.
fn clean_path(input: &str) -> String {
    input.trim().trim_matches('"').trim_matches('\'').to_string()
}

async fn prompt(message: &str) -> anyhow::Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(message.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read from stdin")?;
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let args = Args::try_parse_from([
            "pixelpipe",
            "-v",
            "run",
            "shot.png",
            "--session-id",
            "session_v1",
            "--yes",
        ])
        .unwrap();

        assert!(args.verbose);
        match args.command {
            Command::Run {
                image,
                session_id,
                yes,
                model,
                ..
            } => {
                assert_eq!(image, Some(PathBuf::from("shot.png")));
                assert_eq!(session_id.as_deref(), Some("session_v1"));
                assert!(yes);
                assert!(model.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("\"/tmp/a b.png\"\n"), "/tmp/a b.png");
        assert_eq!(clean_path("  shot.png "), "shot.png");
    }
}
