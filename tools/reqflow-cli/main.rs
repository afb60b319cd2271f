use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::{Parser, Subcommand};
use reqflow::{Config, Context, ExecutionReport, Executor, NodeRegistry, ProjectModel};
use tracing::Level;

/// Run API test graphs from the command line
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute every node of a project in dependency order
    Run {
        /// Path to the project JSON file
        project: PathBuf,
        /// Print the outputs of every node
        #[arg(short, long)]
        verbose: bool,
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Check that a project loads and has no cycles
    Validate {
        /// Path to the project JSON file
        project: PathBuf,
    },
    /// List the available node types
    ListNodes,
}

fn init_logging(config: &Config) {
    let level = config.log.level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();
}

fn load_config(path: Option<&PathBuf>) -> reqflow::Result<Config> {
    match path {
        Some(path) => Config::create(path),
        None => Ok(Config::default()),
    }
}

fn print_report(
    report: &ExecutionReport,
    verbose: bool,
) {
    for result in &report.results {
        match &result.error {
            None => println!("✓ {} ({:?})", result.node_id, result.duration),
            Some(err) => println!("✗ {} ({:?}): {}", result.node_id, result.duration, err),
        }
        if verbose {
            if let Some(outputs) = &result.outputs {
                match serde_json::to_string_pretty(outputs) {
                    Ok(json) => println!("{}", json),
                    Err(err) => println!("  <unprintable outputs: {}>", err),
                }
            }
        }
    }

    println!();
    println!("{}/{} nodes succeeded", report.succeeded_count(), report.results.len());
    if let Some(err) = &report.error {
        println!("stopped: {}", err);
    }
}

async fn run(
    project: PathBuf,
    verbose: bool,
    config: Config,
) -> reqflow::Result<bool> {
    let project = ProjectModel::load(&project).await?;
    let graph = Arc::new(project.to_graph(&NodeRegistry::default())?);

    let mut ctx = Context::new();
    if let Some(timeout) = config.executor.run_timeout() {
        ctx = ctx.with_timeout(timeout);
    }

    let canceller = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    println!("Running project: {}", project.name);
    let report = Executor::new(graph).execute_graph(&ctx).await?;
    print_report(&report, verbose);

    Ok(report.is_success())
}

async fn validate(project: PathBuf) -> reqflow::Result<()> {
    let project = ProjectModel::load(&project).await?;
    let graph = project.to_graph(&NodeRegistry::default())?;
    let order = graph.get_topological_order()?;

    println!("Project {} is valid", project.name);
    println!("{} nodes, {} connections", graph.node_count(), graph.connection_count());
    println!("execution order: {}", order.join(" -> "));
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Run {
            project,
            verbose,
            config,
        } => match load_config(config.as_ref()) {
            Ok(config) => {
                init_logging(&config);
                run(project, verbose, config).await
            }
            Err(err) => Err(err),
        },
        Command::Validate { project } => {
            init_logging(&Config::default());
            validate(project).await.map(|_| true)
        }
        Command::ListNodes => {
            for tag in NodeRegistry::default().available_types() {
                println!("{}", tag);
            }
            Ok(true)
        }
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
