use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

use node_doctor::config::Config;
use node_doctor::doctor::DiagnosticRunner;
use node_doctor::lightsail::LightsailManager;
use node_doctor::logging::init_logging;
use node_doctor::prompt::collect_target;
use node_doctor::remote::SshExecutor;
use node_doctor::report::{self, ReportFormat};
use node_doctor::script::DiagnosticScript;

#[derive(Parser)]
#[command(name = "node-doctor")]
#[command(about = "Diagnose a Node.js/PM2 deployment on an AWS Lightsail instance")]
#[command(version)]
struct Cli {
    /// Lightsail instance name (prompted when omitted)
    #[arg(short, long)]
    instance: Option<String>,

    /// AWS region (prompted when omitted)
    #[arg(short, long)]
    region: Option<String>,

    /// AWS profile to use
    #[arg(short, long)]
    profile: Option<String>,

    /// Configuration file path (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Remote script timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Output format (text, json, yaml)
    #[arg(short, long)]
    format: Option<String>,

    /// Also write the report to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Never prompt; use flags and configured defaults
    #[arg(long)]
    non_interactive: bool,

    /// List the checks the remote script performs and exit
    #[arg(long)]
    list_checks: bool,

    /// Print the remote script instead of running it
    #[arg(long)]
    print_script: bool,

    /// Show supported environment variables and exit
    #[arg(long)]
    env_help: bool,

    /// Write a configuration file with the effective settings and exit
    #[arg(long, value_name = "PATH")]
    init_config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    if cli.env_help {
        println!("Environment variables:");
        for (name, description) in Config::env_variables_help() {
            println!("  {:<28} {}", name, description);
        }
        return Ok(0);
    }

    let mut config = Config::load(cli.config.as_deref()).await?;
    if let Some(timeout) = cli.timeout {
        config.diagnostic.timeout_seconds = timeout;
    }
    if cli.profile.is_some() {
        config.aws.profile = cli.profile.clone();
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    config.validate()?;

    if let Some(path) = &cli.init_config {
        config.save(path).await?;
        println!("Configuration written to {}", path.display());
        return Ok(0);
    }

    let _guard = init_logging(&config.logging)?;
    info!("Starting node-doctor v{}", env!("CARGO_PKG_VERSION"));

    if cli.list_checks {
        for (i, title) in DiagnosticScript::sections().enumerate() {
            println!("{:>2}. {}", i + 1, title);
        }
        return Ok(0);
    }

    if cli.print_script {
        print!("{}", DiagnosticScript::build(&config.target));
        return Ok(0);
    }

    let format: ReportFormat = cli
        .format
        .as_deref()
        .unwrap_or(config.diagnostic.report_format.as_str())
        .parse()?;

    let interactive = !cli.non_interactive && io::stdin().is_terminal();
    let selection = {
        let stdin = io::stdin();
        let mut reader = stdin.lock();
        let mut writer: Box<dyn Write> = if format.is_structured() {
            Box::new(io::stderr())
        } else {
            Box::new(io::stdout())
        };
        collect_target(
            &mut reader,
            &mut writer,
            &config.aws,
            cli.instance.clone(),
            cli.region.clone(),
            interactive,
        )?
    };
    debug!("Target selected: {:?}", selection);

    let manager = LightsailManager::new(&selection.region, config.aws.profile.as_deref()).await;
    debug!("Lightsail client ready for {}", manager.region());
    let executor = SshExecutor::new(manager.clone(), &selection.instance_name, &config.diagnostic);
    let runner = DiagnosticRunner::new(
        manager,
        executor,
        config.target.clone(),
        config.diagnostic.timeout(),
    )
    .with_colors(!format.is_structured() && io::stdout().is_terminal());

    let outcome = if format.is_structured() {
        let outcome = runner.run(&selection, &mut io::sink()).await?;
        println!("{}", report::render(&outcome.report, format)?);
        outcome
    } else {
        runner.run(&selection, &mut io::stdout()).await?
    };

    if let Some(path) = &cli.output {
        let file_format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
            .unwrap_or(format);
        report::save(&outcome.report, path, file_format)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    Ok(if outcome.exit_code == 0 { 0 } else { 1 })
}
