//! nucleusctl - provision and manage LXC servers from the command line.
//!
//! Results are printed as JSON on stdout; logs go to `<home>/logs` (and to
//! stderr with `--verbose`).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use nucleus::hypervisor::LATEST;
use nucleus::{ContainerRequest, NucleusOptions, NucleusRuntime};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "nucleusctl", version, about = "Proxmox LXC server orchestration")]
struct Cli {
    /// JSON configuration file.
    #[arg(long, global = true, env = "NUCLEUS_CONFIG")]
    config: Option<PathBuf>,

    /// Runtime home directory (overrides the configuration).
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Mirror logs to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a server and wait for it to boot.
    Provision(ProvisionArgs),
    /// Start a stopped server.
    Start { name: String },
    /// Gracefully stop a server.
    Shutdown { name: String },
    /// Destroy a server and forget it.
    Delete { name: String },
    /// Print the web console URL for a server.
    Console { name: String },
    /// Show the recorded and live state of a server.
    Inspect { name: String },
    /// List recorded servers.
    List,
    /// List supported OS templates.
    Templates,
}

#[derive(Args)]
struct ProvisionArgs {
    /// Logical server name; generated when omitted.
    name: Option<String>,

    /// OS key, e.g. `ubuntu`.
    #[arg(long)]
    os: String,

    #[arg(long)]
    cores: u32,

    /// Memory in MiB.
    #[arg(long)]
    memory: u32,

    /// Root disk in GiB.
    #[arg(long)]
    disk: u32,

    /// Package to install, as `name` or `name=version`. Repeatable.
    #[arg(long = "package", short = 'p', value_name = "NAME[=VERSION]")]
    packages: Vec<String>,
}

impl ProvisionArgs {
    fn into_request(self) -> Result<ContainerRequest> {
        let mut request = ContainerRequest::new(self.name.unwrap_or_default(), self.os)
            .with_resources(self.cores, self.memory, self.disk);
        for package in &self.packages {
            let (name, version) = match package.split_once('=') {
                Some((name, version)) => (name, version),
                None => (package.as_str(), LATEST),
            };
            if name.is_empty() || version.is_empty() {
                bail!("invalid package '{}', expected NAME[=VERSION]", package);
            }
            request = request.with_package(name, version);
        }
        Ok(request)
    }
}

fn load_options(cli: &Cli) -> Result<NucleusOptions> {
    let mut options = match &cli.config {
        Some(path) => NucleusOptions::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => NucleusOptions::default(),
    };
    if let Some(home) = &cli.home {
        options.home_dir = home.clone();
    }
    options.log_to_stderr |= cli.verbose;
    Ok(options)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let options = load_options(&cli)?;
    let runtime = NucleusRuntime::new(options).context("initializing runtime")?;

    match cli.command {
        Commands::Provision(args) => {
            let outcome = runtime.provision(args.into_request()?).await?;
            print_json(&outcome)?;
            if let Some(err) = outcome.partial_failure() {
                eprintln!("error: {}", err);
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Start { name } => print_json(&runtime.start(&name).await?)?,
        Commands::Shutdown { name } => print_json(&runtime.shutdown(&name).await?)?,
        Commands::Delete { name } => print_json(&runtime.delete(&name).await?)?,
        Commands::Console { name } => print_json(&runtime.open_console(&name).await?)?,
        Commands::Inspect { name } => print_json(&runtime.inspect(&name).await?)?,
        Commands::List => print_json(&runtime.list()?)?,
        Commands::Templates => {
            for (os, template) in runtime.templates() {
                println!("{:<12} {}", os, template);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
