//! Microworld CLI - deploy agents into grid microworlds.
//!
//! Single binary that provides:
//! - `microworld deploy` - run an agent against a world, streaming events
//! - `microworld replay` - run a recorded transcript instead of a live agent
//! - `microworld tool-worker` - session tool worker, spawned by the agent
//! - `microworld worlds` / `microworld events` - inspect worlds and run logs
//! - `microworld init` - scaffold a project

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::{fmt, EnvFilter};

use microworld_core::{
    adapters::{ProcessLauncher, ReasoningLauncher, ScriptedLauncher},
    observability::{list_sessions, EventLog},
    pipeline::{DeploymentPipeline, DeploymentRequest, EngineRegistry},
    state::{CatalogToolStore, FileWorldStore, WorldStateStore, WorldStore},
    worker::{serve, ToolWorker},
    DeployConfig,
};

#[derive(Parser)]
#[command(name = "microworld")]
#[command(about = "Deploy reasoning agents into grid microworlds", version)]
struct Cli {
    /// Project root directory
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy an agent into a world
    Deploy {
        /// World id under the worlds directory
        #[arg(long)]
        world: String,

        /// Agent id, selects the tool allow-list
        #[arg(long, default_value = "default")]
        agent: String,

        /// Goal handed to the agent
        #[arg(long)]
        goal: String,
    },

    /// Replay a recorded agent transcript (one JSON message per line)
    Replay {
        transcript: PathBuf,

        #[arg(long)]
        world: String,

        #[arg(long, default_value = "default")]
        agent: String,

        #[arg(long, default_value = "replay")]
        goal: String,
    },

    /// Serve tool calls for one session over stdin/stdout
    ToolWorker,

    /// List available worlds
    Worlds,

    /// Show recorded events of past sessions
    Events {
        /// Session id; lists sessions when omitted
        session: Option<String>,

        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Initialize a new project
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout carries events and the tool protocol.
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let project_root = match cli.project {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Deploy { world, agent, goal } => {
            let request = DeploymentRequest::new(agent, world, goal);
            run_deployment(&project_root, request, None).await
        }
        Commands::Replay {
            transcript,
            world,
            agent,
            goal,
        } => {
            let request = DeploymentRequest::new(agent, world, goal);
            run_deployment(&project_root, request, Some(&transcript)).await
        }
        Commands::ToolWorker => run_tool_worker().await,
        Commands::Worlds => list_worlds(&project_root).await,
        Commands::Events { session, limit } => show_events(&project_root, session, limit),
        Commands::Init => init_project(&project_root),
    }
}

fn load_config(project_root: &Path) -> Result<DeployConfig> {
    let mut config = DeployConfig::load_from_project(project_root)?;
    config.resolve_paths(project_root);
    Ok(config)
}

async fn run_deployment(
    project_root: &Path,
    request: DeploymentRequest,
    transcript: Option<&Path>,
) -> Result<()> {
    let config = load_config(project_root)?;

    let engines = EngineRegistry::with_defaults(&config)?;
    let mut tools = CatalogToolStore::new(engines.catalog(), microworld_grid::GAME_TYPE);
    if let Some(allowed) = config.agent_tools(&request.agent_id) {
        tools = tools.allow(request.agent_id.clone(), allowed.to_vec());
    }

    let launcher: Arc<dyn ReasoningLauncher> = match transcript {
        Some(path) => Arc::new(ScriptedLauncher::from_jsonl(path)?),
        None => Arc::new(ProcessLauncher::new(config.reasoning.clone())),
    };
    let states = match &config.snapshot_dir {
        Some(dir) => WorldStateStore::with_mirror(dir),
        None => WorldStateStore::new(),
    };

    let pipeline = DeploymentPipeline::new(
        Arc::new(FileWorldStore::new(&config.worlds_dir)),
        Arc::new(tools),
        launcher,
        Arc::new(engines),
        states,
    )
    .with_config(&config);

    let session = pipeline.deploy(request);
    let log = EventLog::new(&config.runs_dir, session.session_id())?;
    tracing::info!(
        session_id = %session.session_id(),
        log = %log.path().display(),
        "Session started"
    );

    let mut events = Box::pin(session.into_stream());
    let mut completed = false;
    while let Some(event) = events.next().await {
        log.record(&event)?;
        println!("{}", serde_json::to_string(&event)?);
        if event.is_terminal() {
            completed = event.error_code().is_none();
        }
    }

    if !completed {
        bail!("Deployment did not complete");
    }
    Ok(())
}

async fn run_tool_worker() -> Result<()> {
    let worker = ToolWorker::from_env()?;
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    serve(&worker, stdin, tokio::io::stdout()).await
}

async fn list_worlds(project_root: &Path) -> Result<()> {
    let config = load_config(project_root)?;
    let store = FileWorldStore::new(&config.worlds_dir);
    let ids = store.list()?;

    println!("Worlds in {}: {}", store.dir().display(), ids.len());
    for id in ids {
        match store.get_world(&id).await {
            Ok(Some(world)) => println!(
                "  {} - {} {}x{}, agent at {}",
                id, world.game_type, world.state.width, world.state.height, world.state.agent_position
            ),
            Ok(None) => {}
            Err(e) => println!("  {} - unreadable: {:#}", id, e),
        }
    }

    Ok(())
}

fn show_events(project_root: &Path, session: Option<String>, limit: usize) -> Result<()> {
    let config = load_config(project_root)?;

    let Some(session) = session else {
        let sessions = list_sessions(&config.runs_dir)?;
        println!("Recorded sessions: {}", sessions.len());
        for id in sessions {
            println!("  {}", id);
        }
        return Ok(());
    };

    let log = EventLog::new(&config.runs_dir, &session)?;
    for event in log.read_recent(limit) {
        let timestamp = event
            .get("timestamp")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let detail = event
            .get("message")
            .or_else(|| event.get("text"))
            .or_else(|| event.get("tool_name"))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        println!("  [{}] {} {}", timestamp, event.event_type.as_str(), detail);
    }

    Ok(())
}

fn init_project(project_root: &Path) -> Result<()> {
    let microworld_dir = project_root.join(".microworld");
    let worlds_dir = microworld_dir.join("worlds");

    std::fs::create_dir_all(&worlds_dir)?;

    let config_path = microworld_dir.join("config.yaml");
    if !config_path.exists() {
        let default_config = r#"# Microworld deployment configuration

worlds_dir: .microworld/worlds
runs_dir: .microworld/runs
snapshot_dir: .microworld/snapshots
event_buffer: 64
default_item: item

reasoning:
  command: microworld-agent
  args: []

tool_worker:
  command: microworld
  args: [tool-worker]

agents:
  scout:
    tools: [observe, move, wait]
"#;
        std::fs::write(&config_path, default_config)?;
    }

    let world_path = worlds_dir.join("example.yaml");
    if !world_path.exists() {
        let example_world = r#"game_type: grid_navigation
width: 4
height: 3
agent_position: [0, 0]
grid:
  - [".", ".", ".", "."]
  - [".", ".", "key", "."]
  - [".", ".", ".", "."]
"#;
        std::fs::write(&world_path, example_world)?;
    }

    println!("Initialized microworld project at {}", project_root.display());
    println!();
    println!("Created:");
    println!("  .microworld/config.yaml - deployment configuration");
    println!("  .microworld/worlds/example.yaml - example world");
    println!();
    println!("Next steps:");
    println!("  1. Run: microworld worlds");
    println!("  2. Run: microworld deploy --world example --goal \"Pick up the key\"");

    Ok(())
}
