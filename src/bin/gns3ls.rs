//! Read-only command line browser for a GNS3 controller

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use gns3_client::{Controller, ControllerConfig, Entity};
use std::path::PathBuf;
use tracing::Level;

/// List and inspect GNS3 controller resources
#[derive(Parser, Debug)]
#[command(name = "gns3ls", version, about, long_about = None)]
struct Args {
    /// Controller URL, e.g. http://localhost:3080
    #[arg(short, long)]
    server: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the controller version
    Version,
    /// List projects
    Projects,
    /// List computes and their capabilities
    Computes,
    /// List available VM engines
    Engines,
    /// Show a project's nodes, links and drawings (by name or id)
    Show { project: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok()?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .init();

    tracing::info!("gns3ls started with log level: {:?}", level);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("gns3-client").join("gns3ls.log");
    }
    PathBuf::from("gns3ls.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let config = match &args.server {
        Some(server) => ControllerConfig::from_url(server)?,
        None => ControllerConfig::discover(),
    };

    match args.command {
        Command::Version => {
            let controller = Controller::new(&config)?;
            let version = controller.version().await?;
            println!("{}", version.version);
        }
        Command::Projects => {
            let mut controller = Controller::new(&config)?;
            for project in controller.refresh_projects().await? {
                let id = project
                    .id()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<38} {:<8} {}", id, project.status.as_str(), project.name);
            }
        }
        Command::Computes => {
            let mut controller = Controller::new(&config)?;
            for compute in controller.refresh_computes().await? {
                println!(
                    "{:<12} {:<20} connected={} [{}]",
                    compute.compute_id,
                    compute.name,
                    compute.connected,
                    compute.capabilities.node_types.join(", ")
                );
            }
        }
        Command::Engines => {
            let controller = Controller::new(&config)?;
            for engine in controller.vm_engines().await? {
                println!("{:<12} {}", engine.engine_id, engine.name);
            }
        }
        Command::Show { project } => {
            let mut controller = Controller::connect(&config).await?;
            let project_id = controller
                .project_by_name(&project)
                .or_else(|| {
                    project
                        .parse()
                        .ok()
                        .and_then(|id| controller.project(id))
                })
                .and_then(|p| p.id())
                .ok_or_else(|| anyhow::anyhow!("no such project: {project}"))?;

            let refreshed = controller.refresh_project(project_id).await?;
            println!("project {} ({})", refreshed.name, refreshed.status.as_str());

            println!("nodes:");
            for node in controller.nodes_of(project_id) {
                println!(
                    "  {:<20} {:<10} {:<10} {} ports",
                    node.name,
                    node.node_type,
                    node.status.as_str(),
                    node.ports().len()
                );
            }

            println!("links:");
            for link in controller.links_of(project_id) {
                if let Some([a, b]) = link.endpoints() {
                    let name = |id| {
                        controller
                            .node(id)
                            .map(|n| n.name.clone())
                            .unwrap_or_else(|| id.to_string())
                    };
                    println!(
                        "  {} {}/{} <-> {} {}/{}",
                        name(a.node_id),
                        a.adapter_number,
                        a.port_number,
                        name(b.node_id),
                        b.adapter_number,
                        b.port_number
                    );
                }
            }

            println!("drawings: {}", controller.drawings_of(project_id).len());
        }
    }

    Ok(())
}
