use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use common::config::Settings;
use etl::utils::logging::init_tracing;
use etl::{EtlPipeline, RunOptions, run_etl_pipeline};
use std::process;
use tracing::info;

const DEFAULT_CONFIG: &str = "config/etl.toml";

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .default_value(DEFAULT_CONFIG)
        .help("Sets a custom config file")
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).action(ArgAction::SetTrue).help(help)
}

fn cli() -> Command {
    Command::new("Spotify ETL")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Downloads, cleans and loads the Spotify tracks dataset")
        .subcommand_required(true)
        .subcommand(
            Command::new("download")
                .about("Fetch the raw CSV exports from Kaggle")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("transform")
                .about("Transform the CSV exports and upload them as Parquet")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("load")
                .about("Load the last uploaded output into Postgres")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("run")
                .about("Run the full pipeline")
                .arg(config_arg())
                .arg(flag("skip-download", "Use the files already in the artifacts directory"))
                .arg(flag("skip-upload", "Do not write Parquet output to object storage"))
                .arg(flag("skip-load", "Do not load the output into Postgres")),
        )
}

fn settings(matches: &ArgMatches) -> anyhow::Result<Settings> {
    let config_path = matches
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or(DEFAULT_CONFIG);
    let settings = Settings::new(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;
    init_tracing(&settings.logging)?;
    info!(config = config_path, "Configuration loaded");
    Ok(settings)
}

async fn dispatch(matches: ArgMatches) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("download", sub)) => {
            let pipeline = EtlPipeline::new(settings(sub)?);
            pipeline.download().await.context("Download failed")?;
        }
        Some(("transform", sub)) => {
            let pipeline = EtlPipeline::new(settings(sub)?);
            let output = pipeline.transform().await.context("Transform failed")?;
            pipeline.upload(&output).await.context("Upload failed")?;
        }
        Some(("load", sub)) => {
            let pipeline = EtlPipeline::new(settings(sub)?);
            pipeline
                .load_from_storage()
                .await
                .context("Load failed")?;
        }
        Some(("run", sub)) => {
            let settings = settings(sub)?;
            let options = RunOptions {
                skip_download: sub.get_flag("skip-download"),
                skip_upload: sub.get_flag("skip-upload"),
                skip_load: sub.get_flag("skip-load"),
            };
            let report = run_etl_pipeline(&settings, options)
                .await
                .context("ETL pipeline failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => anyhow::bail!("Please specify a valid subcommand"),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = dispatch(cli().get_matches()).await {
        eprintln!("ETL pipeline error: {:#}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_run_flags() {
        let matches = cli()
            .try_get_matches_from(["spotify-etl", "run", "--skip-download", "-c", "local.toml"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "run");
        assert!(sub.get_flag("skip-download"));
        assert!(!sub.get_flag("skip-load"));
        assert_eq!(sub.get_one::<String>("config").unwrap(), "local.toml");
    }

    #[test]
    fn test_config_defaults() {
        let matches = cli().try_get_matches_from(["spotify-etl", "load"]).unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<String>("config").unwrap(), DEFAULT_CONFIG);
    }
}
