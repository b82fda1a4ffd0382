//! # Infercast CLI Entry Point
//!
//! Sends batches of completion prompts to a cluster of inference servers.
//!
//! ## Usage
//!
//! ```bash
//! # Which endpoints answer?
//! infercast -n 10.0.0.1 -n 10.0.0.2 probe
//!
//! # One short request per endpoint, with latency
//! infercast --endpoints-file ips.txt smoke
//!
//! # Dispatch a prompt file, write prompt -> response JSON
//! infercast --inventory hosts.ini -c 50 run prompts.json -o results.json
//!
//! # Movie tasks over the built-in title list
//! infercast --endpoints-file ips.txt movies --task details -o details.json
//!
//! # Turn an INI inventory into an address list
//! infercast extract hosts.ini -o ips.txt
//! ```
//!
//! Cluster options go before the subcommand. Logs go to stderr; JSON output
//! goes to stdout unless `-o` is given.

use anyhow::{bail, Context, Result};
use argh::FromArgs;
use infercast_cli::inventory::{read_address_list, read_ini_inventory, write_address_list};
use infercast_cli::movies::{run_details, run_synopsis, MovieTask};
use infercast_cli::prompts::{default_titles, read_prompts, read_titles};
use infercast_cli::smoke::smoke_test;
use infercast_common::HttpTransport;
use infercast_dispatcher::{DispatchConfig, Dispatcher, RetryConfig};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

#[derive(FromArgs)]
/// Infercast - batch completion dispatch across an inference cluster
struct Cli {
    /// endpoint address (IP literal); may be repeated
    #[argh(option, short = 'n', long = "endpoint")]
    endpoints: Vec<String>,

    /// file with one endpoint address per line
    #[argh(option, long = "endpoints-file")]
    endpoints_file: Option<String>,

    /// INI inventory whose keys name the endpoint hosts
    #[argh(option, long = "inventory")]
    inventory: Option<String>,

    /// port every endpoint listens on
    #[argh(option, short = 'p', long = "port", default = "8088")]
    port: u16,

    /// model identifier in the completion route
    #[argh(option, long = "model", default = "String::from(\"llama2_13B_chat\")")]
    model: String,

    /// number of workers, which bounds requests in flight
    #[argh(option, short = 'c', long = "concurrency", default = "100")]
    concurrency: usize,

    /// retries per request after the first attempt, always on the same endpoint
    #[argh(option, long = "retries", default = "3")]
    retries: u32,

    /// timeout for each completion attempt in seconds
    #[argh(option, long = "timeout", default = "60")]
    timeout_secs: u64,

    /// timeout for each liveness probe in milliseconds
    #[argh(option, long = "probe-timeout", default = "2000")]
    probe_timeout_ms: u64,

    /// TCP connect timeout in milliseconds
    #[argh(option, long = "connect-timeout", default = "5000")]
    connect_timeout_ms: u64,

    /// max_tokens sent with every batch request
    #[argh(option, long = "max-tokens", default = "500")]
    max_tokens: u32,

    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Probe(ProbeArgs),
    Smoke(SmokeArgs),
    Run(RunArgs),
    Movies(MoviesArgs),
    Extract(ExtractArgs),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "probe")]
/// probe every endpoint once and print live and excluded endpoints
struct ProbeArgs {}

#[derive(FromArgs)]
#[argh(subcommand, name = "smoke")]
/// send one short completion to each endpoint in turn
struct SmokeArgs {
    /// write results to this file instead of stdout
    #[argh(option, short = 'o', long = "output")]
    output: Option<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "run")]
/// dispatch prompts from a file
struct RunArgs {
    /// prompt file: a JSON array of strings, or one prompt per line
    #[argh(positional)]
    prompts: String,

    /// write results to this file instead of stdout
    #[argh(option, short = 'o', long = "output")]
    output: Option<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "movies")]
/// run the movie synopsis or movie details task
struct MoviesArgs {
    /// task to run: synopsis or details
    #[argh(option, short = 't', long = "task", default = "MovieTask::Synopsis")]
    task: MovieTask,

    /// file with one movie title per line; defaults to the built-in list
    #[argh(option, long = "titles")]
    titles: Option<String>,

    /// batches sent for the details task before giving up on a title
    #[argh(option, long = "rounds", default = "5")]
    rounds: u32,

    /// write results to this file instead of stdout
    #[argh(option, short = 'o', long = "output")]
    output: Option<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "extract")]
/// write the hosts of an INI inventory as an address list
struct ExtractArgs {
    /// INI inventory file
    #[argh(positional)]
    inventory: String,

    /// write the list to this file instead of stdout
    #[argh(option, short = 'o', long = "output")]
    output: Option<String>,
}

impl Cli {
    /// Collects endpoint addresses from every source given, in order:
    /// `-n` options, then the address list, then the inventory.
    fn endpoints(&self) -> Result<Vec<String>> {
        let mut endpoints = self.endpoints.clone();
        if let Some(path) = &self.endpoints_file {
            endpoints.extend(read_address_list(Path::new(path))?);
        }
        if let Some(path) = &self.inventory {
            endpoints.extend(read_ini_inventory(Path::new(path))?);
        }
        if endpoints.is_empty() {
            bail!("No endpoints given. Use --endpoint, --endpoints-file or --inventory.");
        }
        Ok(endpoints)
    }

    fn dispatch_config(&self) -> Result<DispatchConfig> {
        Ok(DispatchConfig::new(self.endpoints()?)
            .with_port(self.port)
            .with_model(self.model.clone())
            .with_concurrency(self.concurrency)
            .with_retry(RetryConfig {
                max_retries: self.retries,
                ..Default::default()
            })
            .with_request_timeout(Duration::from_secs(self.timeout_secs))
            .with_probe_timeout(Duration::from_millis(self.probe_timeout_ms))
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_max_tokens(self.max_tokens))
    }

    fn dispatcher(&self) -> Result<Dispatcher> {
        Ok(Dispatcher::new(self.dispatch_config()?)?)
    }
}

/// Writes `value` as pretty JSON to `output`, or to stdout.
fn write_json<T: Serialize>(output: Option<&str>, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path))?;
            tracing::info!("Results written to {}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Set default log level to INFO, but allow RUST_LOG env var to override
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Probe(_) => {
            let report = cli.dispatcher()?.probe().await;
            write_json(None, &report)
        }
        Commands::Smoke(args) => {
            let config = cli.dispatch_config()?;
            let transport = HttpTransport::new(config.transport_config());
            let results = smoke_test(
                &transport,
                &config.endpoints,
                config.port,
                config.request_timeout,
            )
            .await;
            tracing::info!(
                "{} of {} endpoints passed the smoke test",
                results.len(),
                config.endpoints.len()
            );
            write_json(args.output.as_deref(), &results)
        }
        Commands::Run(args) => {
            let prompts = read_prompts(Path::new(&args.prompts))?;
            tracing::info!("Sending {} prompts", prompts.len());
            let report = cli.dispatcher()?.dispatch(prompts).await?;
            if !report.exhausted.is_empty() {
                tracing::warn!("{} prompts got no response", report.exhausted.len());
            }
            write_json(args.output.as_deref(), &report.results)
        }
        Commands::Movies(args) => {
            let titles = match &args.titles {
                Some(path) => read_titles(Path::new(path))?,
                None => default_titles(),
            };
            let dispatcher = cli.dispatcher()?;
            match args.task {
                MovieTask::Synopsis => {
                    let results = run_synopsis(&dispatcher, &titles).await?;
                    write_json(args.output.as_deref(), &results)
                }
                MovieTask::Details => {
                    let mut rng = rand::rng();
                    let details = run_details(&dispatcher, &titles, args.rounds, &mut rng).await?;
                    write_json(args.output.as_deref(), &details)
                }
            }
        }
        Commands::Extract(args) => {
            let hosts = read_ini_inventory(Path::new(&args.inventory))?;
            tracing::info!("Extracted {} addresses from {}", hosts.len(), args.inventory);
            match &args.output {
                Some(path) => write_address_list(Path::new(path), &hosts),
                None => {
                    println!("{}", hosts.join("\n"));
                    Ok(())
                }
            }
        }
    }
}

/// CLI argument parsing tests.
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::from_args(&["infercast"], args).unwrap()
    }

    #[test]
    fn test_cli_parse_defaults() {
        let cli = parse(&["-n", "10.0.0.1", "probe"]);
        assert_eq!(cli.endpoints, vec!["10.0.0.1".to_string()]);
        assert_eq!(cli.port, 8088);
        assert_eq!(cli.model, "llama2_13B_chat");
        assert_eq!(cli.concurrency, 100);
        assert_eq!(cli.retries, 3);
        assert_eq!(cli.timeout_secs, 60);
        assert_eq!(cli.probe_timeout_ms, 2000);
        assert_eq!(cli.connect_timeout_ms, 5000);
        assert_eq!(cli.max_tokens, 500);
        assert!(matches!(cli.command, Commands::Probe(_)));
    }

    #[test]
    fn test_cli_parse_run() {
        let cli = parse(&[
            "--endpoint", "10.0.0.1",
            "--endpoint", "10.0.0.2",
            "-c", "8",
            "--retries", "1",
            "run", "prompts.json",
            "-o", "out.json",
        ]);
        assert_eq!(cli.endpoints.len(), 2);
        assert_eq!(cli.concurrency, 8);
        match cli.command {
            Commands::Run(RunArgs { prompts, output }) => {
                assert_eq!(prompts, "prompts.json");
                assert_eq!(output, Some("out.json".to_string()));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_movies() {
        let cli = parse(&["-n", "10.0.0.1", "movies", "--task", "details", "--rounds", "2"]);
        match cli.command {
            Commands::Movies(MoviesArgs { task, titles, rounds, output }) => {
                assert_eq!(task, MovieTask::Details);
                assert!(titles.is_none());
                assert_eq!(rounds, 2);
                assert!(output.is_none());
            }
            _ => panic!("Expected Movies command"),
        }

        let cli = parse(&["-n", "10.0.0.1", "movies"]);
        assert!(matches!(
            cli.command,
            Commands::Movies(MoviesArgs { task: MovieTask::Synopsis, rounds: 5, .. })
        ));
    }

    #[test]
    fn test_cli_parse_bad_task() {
        assert!(Cli::from_args(&["infercast"], &["movies", "--task", "reviews"]).is_err());
    }

    #[test]
    fn test_cli_parse_missing_subcommand() {
        assert!(Cli::from_args(&["infercast"], &["-n", "10.0.0.1"]).is_err());
    }

    #[test]
    fn test_endpoints_from_all_sources() {
        let mut list = tempfile::NamedTempFile::new().unwrap();
        writeln!(list, "10.0.0.2\n# spare\n10.0.0.3").unwrap();
        let mut inventory = tempfile::NamedTempFile::new().unwrap();
        writeln!(inventory, "[gpu]\n10.0.0.4 ansible_user=root").unwrap();

        let list_path = list.path().to_str().unwrap();
        let inventory_path = inventory.path().to_str().unwrap();
        let cli = parse(&[
            "-n", "10.0.0.1",
            "--endpoints-file", list_path,
            "--inventory", inventory_path,
            "probe",
        ]);

        assert_eq!(
            cli.endpoints().unwrap(),
            vec!["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4"]
        );
    }

    #[test]
    fn test_no_endpoints_is_an_error() {
        let cli = parse(&["probe"]);
        assert!(cli.endpoints().is_err());
    }

    #[test]
    fn test_dispatch_config_from_options() {
        let cli = parse(&[
            "-n", "10.0.0.1",
            "-p", "9000",
            "--model", "tiny",
            "--timeout", "5",
            "--probe-timeout", "250",
            "--max-tokens", "64",
            "probe",
        ]);
        let config = cli.dispatch_config().unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.model, "tiny");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.probe_timeout, Duration::from_millis(250));
        assert_eq!(config.max_tokens, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let cli = parse(&["-n", "10.0.0.1", "-c", "0", "probe"]);
        assert!(cli.dispatcher().is_err());
    }
}
