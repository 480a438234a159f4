use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use declass_cli::commands;
use declass_cli::{logging, DeclassConfig};
use declass_m2m::M2mClient;
use declass_scene::Dataset;
use declass_sync::SyncRequest;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, warn};

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .short('c')
        .value_parser(value_parser!(PathBuf))
        .help("Path to declass.toml")
}

fn dataset_arg() -> Arg {
    Arg::new("dataset")
        .long("dataset")
        .short('d')
        .action(ArgAction::Append)
        .value_parser(|s: &str| s.parse::<Dataset>())
        .help("Limit to a dataset (corona2, declassii, declassiii); repeatable")
}

fn cli() -> Command {
    Command::new("declass")
        .version(declass_cli::VERSION)
        .about("Track download availability of declassified satellite scenes")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("sync")
                .about("Reconcile the store against the catalog and regenerate the artifact")
                .arg(config_arg())
                .arg(dataset_arg())
                .arg(
                    Arg::new("full-rescan")
                        .long("full-rescan")
                        .action(ArgAction::SetTrue)
                        .help("Scan every scene instead of only available ones"),
                )
                .arg(
                    Arg::new("no-export")
                        .long("no-export")
                        .action(ArgAction::SetTrue)
                        .help("Skip artifact regeneration"),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Write the availability artifact from the store")
                .arg(config_arg())
                .arg(dataset_arg())
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Artifact path (defaults to artifact_path)"),
                ),
        )
        .subcommand(
            Command::new("stats")
                .about("Show per-dataset store counts")
                .arg(config_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

fn datasets(args: &ArgMatches) -> Vec<Dataset> {
    args.get_many::<Dataset>("dataset")
        .map(|values| values.copied().collect())
        .unwrap_or_default()
}

fn load_config(args: &ArgMatches) -> anyhow::Result<DeclassConfig> {
    DeclassConfig::load(args.get_one::<PathBuf>("config").map(PathBuf::as_path))
}

async fn run_sync(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let config = load_config(args)?;
    let (username, token) = config.catalog.credentials()?;
    let request = SyncRequest::new(config.select_datasets(&datasets(args)))
        .with_full_rescan(args.get_flag("full-rescan"));

    let client = Arc::new(
        M2mClient::login(config.catalog.m2m_config(), &username, &token)
            .await
            .context("catalog login failed")?,
    );
    let outcome =
        commands::sync(&config, client.clone(), &request, !args.get_flag("no-export")).await;
    if let Err(err) = client.logout().await {
        warn!(error = %err, "catalog logout failed");
    }
    let outcome = outcome?;

    print!("{}", commands::render_sync_summary(&outcome.report));
    if let Some(count) = outcome.exported {
        println!("  {count} features written to {}", config.artifact_path.display());
    }
    Ok(if outcome.failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn run_export(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let config = load_config(args)?;
    let output = args.get_one::<PathBuf>("output").cloned();
    let (path, count) = commands::export_from_config(&config, &datasets(args), output)?;
    println!("{count} features written to {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn run_stats(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let config = load_config(args)?;
    let stats = commands::stats(&config)?;
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", commands::render_stats(&stats));
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    logging::init(matches.get_flag("log-json"));

    let result = match matches.subcommand() {
        Some(("sync", args)) => run_sync(args).await,
        Some(("export", args)) => run_export(args),
        Some(("stats", args)) => run_stats(args),
        _ => Ok(ExitCode::FAILURE),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
