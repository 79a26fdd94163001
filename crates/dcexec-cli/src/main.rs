//! # dcexec CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Serve on the default port, keeping binaries in /var/tmp/dcexec
//! dcexec worker --dir /var/tmp/dcexec
//!
//! # Run ./sort on one of two workers
//! dcexec run -H 10.0.0.1 -H 10.0.0.2 ./sort < input.txt > sorted.txt
//!
//! # Four runs spread 3:1 over two workers
//! dcexec run -H 10.0.0.1 -H 10.0.0.2 --policy weighted -w 3 -w 1 -n 4 ./simulate
//! ```

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dcexec_cli::{bind_address, build_policy, resolve_port, transport_config, Cli, Commands, RunArgs, PORT_ENV};
use dcexec_client::{Client, HostRegistry, TcpCollaborator};
use dcexec_worker::{WorkerConfig, WorkerServer};

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Logs go to stderr so `run` leaves stdout to the remote program
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let port = resolve_port(std::env::var(PORT_ENV).ok().as_deref())?;

    match cli.command {
        Commands::Worker(args) => {
            let mut config = WorkerConfig::new()
                .with_execution_timeout(Duration::from_millis(args.max_execution_time_ms));
            if let Some(dir) = &args.dir {
                config = config.with_storage_dir(dir);
            }
            config.validate()?;
            tracing::info!("Maximum execution time: {}ms", args.max_execution_time_ms);

            let server = WorkerServer::bind(&bind_address(args.bind.as_deref(), port), config).await?;
            server.run().await?;
        }
        Commands::Run(args) => {
            // Remote calls block, keep them off the async workers
            tokio::task::spawn_blocking(move || run(args, port))
                .await
                .context("run task failed")??;
        }
    }

    Ok(())
}

fn run(args: RunArgs, port: u16) -> Result<()> {
    if args.hosts.is_empty() {
        anyhow::bail!("at least one --host is required");
    }
    if args.count == 0 {
        anyhow::bail!("--count must be at least 1");
    }

    let mut stdin = Vec::new();
    std::io::stdin()
        .read_to_end(&mut stdin)
        .context("reading stdin")?;

    let collaborator = Arc::new(TcpCollaborator::new(transport_config(port))?);
    let registry = HostRegistry::new(collaborator);
    let policy = build_policy(&args.policy, &args.weights)?;
    let client = Client::from_addresses(&registry, &args.hosts, policy)?;

    let pending: Vec<_> = (0..args.count)
        .map(|_| client.distribute_with_args(&args.binary, args.args.clone(), stdin.clone()))
        .collect();

    let mut stdout = std::io::stdout().lock();
    for run in pending {
        let output = run.wait().with_context(|| format!("running {}", args.binary))?;
        stdout.write_all(&output)?;
    }
    stdout.flush()?;

    // Dropping the client removes the binary from every worker
    drop(client);
    Ok(())
}
