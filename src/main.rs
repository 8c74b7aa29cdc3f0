use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chain_analyst::cli::{Cli, Commands, ConfigAction};
use chain_analyst::config::AnalystConfig;
use chain_analyst::enclave::MockEnclave;
use chain_analyst::error::Result;
use chain_analyst::ledger::InMemoryLedger;
use chain_analyst::provider::MockChainClient;
use chain_analyst::tasks::{TaskCatalog, TaskKind};
use chain_analyst::{GovernanceAnalyst, TaskDispatcher};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("chain_analyst=debug")
    } else {
        EnvFilter::new("chain_analyst=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = AnalystConfig::load(&cli.config_dir).await?;

    match cli.command {
        Commands::Tasks => cmd_tasks(&config),
        Commands::Analyze { task, json } => cmd_analyze(&config, task, json),
        Commands::Config { action } => cmd_config(&cli.config_dir, &config, action).await,
    }
}

fn build_analyst(config: &AnalystConfig) -> GovernanceAnalyst {
    let dispatcher = TaskDispatcher::new(
        Arc::new(TaskCatalog::with_builtin_tasks()),
        Arc::new(InMemoryLedger::new()),
        Arc::new(MockEnclave::default()),
        config.dispatch.clone(),
    );
    GovernanceAnalyst::new(
        Arc::new(MockChainClient::new(config.network.name.clone())),
        dispatcher,
        config.clone(),
    )
}

fn cmd_tasks(config: &AnalystConfig) -> Result<()> {
    let analyst = build_analyst(config);
    let catalog = analyst.dispatcher().catalog();

    for name in catalog.list_tasks() {
        println!("{}", name);
        if let Some(kind) = TaskKind::parse(name) {
            let requirements = catalog.requirements_of(kind)?;
            for (category, fields) in requirements.categories() {
                println!("  {}: {}", category, fields.join(", "));
            }
        }
    }
    Ok(())
}

fn cmd_analyze(config: &AnalystConfig, task: Option<String>, json: bool) -> Result<()> {
    let kind = task.as_deref().map(str::parse::<TaskKind>).transpose()?;

    let analyst = build_analyst(config);
    let run = analyst.decide_and_run(kind);
    let outcome = &run.outcome;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.result)?);
        return Ok(());
    }

    println!("Task: {}", run.selected_task);
    if let Some(task_id) = &outcome.task_id {
        println!("Task id: {}", task_id);
    }
    if let Some(action_id) = &outcome.action_id {
        println!("Action id: {}", action_id);
    }
    match (&outcome.result.success, &outcome.result.error) {
        (true, _) => println!("Status: success"),
        (false, Some(error)) => println!("Status: failed ({})", error),
        (false, None) => println!("Status: failed"),
    }
    if outcome.anchored {
        println!(
            "Anchored: yes ({})",
            outcome.tx_hash.as_deref().unwrap_or("-")
        );
    } else {
        println!("Anchored: no");
    }

    if let Some(report) = &outcome.result.report {
        if let Some(level) = report.risk_level() {
            println!("Risk level: {}", level);
        }
        let recommendations = report.recommendations();
        if !recommendations.is_empty() {
            println!("Recommendations:");
            for recommendation in recommendations {
                println!("  - {}", recommendation);
            }
        }
    }

    Ok(())
}

async fn cmd_config(
    config_dir: &std::path::Path,
    config: &AnalystConfig,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigAction::Init => {
            AnalystConfig::default().save(config_dir).await?;
            println!(
                "Wrote {}",
                config_dir.join(chain_analyst::config::CONFIG_FILE).display()
            );
        }
    }
    Ok(())
}
