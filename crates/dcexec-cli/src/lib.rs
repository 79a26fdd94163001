// Copyright 2026 dcexec Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # dcexec CLI
//!
//! Command-line interface for dcexec.
//!
//! ## Key Commands
//!
//! - `dcexec worker`: serve uploads and executions on this machine
//! - `dcexec run`: run a local binary on one or more workers, stdin to stdout

use std::time::Duration;

use argh::FromArgs;
use dcexec_client::BalancePolicy;
use dcexec_common::transport::{TransportConfig, DEFAULT_PORT};

/// Environment variable overriding the default worker port.
pub const PORT_ENV: &str = "DCEXEC_PORT";

#[derive(FromArgs, Debug)]
/// dcexec - run local binaries on remote workers
pub struct Cli {
    #[argh(subcommand)]
    pub command: Commands,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
pub enum Commands {
    Worker(WorkerArgs),
    Run(RunArgs),
}

#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand, name = "worker")]
/// start a worker
pub struct WorkerArgs {
    /// address to listen on (default: 0.0.0.0 on the default port)
    #[argh(option, short = 'b')]
    pub bind: Option<String>,

    /// directory uploaded binaries are stored in (default: the temp dir)
    #[argh(option, long = "dir")]
    pub dir: Option<String>,

    /// maximum run time of one execution in milliseconds
    #[argh(option, long = "max-execution-time-ms", default = "30000")]
    pub max_execution_time_ms: u64,
}

#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand, name = "run")]
/// run a local binary on workers, feeding it this process's stdin
pub struct RunArgs {
    /// worker address; repeat for several workers
    #[argh(option, short = 'H', long = "host")]
    pub hosts: Vec<String>,

    /// balance policy: round-robin, weighted or least-connections
    #[argh(option, long = "policy", default = "\"round-robin\".into()")]
    pub policy: String,

    /// weight of the matching --host for the weighted policy
    #[argh(option, short = 'w', long = "weight")]
    pub weights: Vec<u32>,

    /// argument passed to the remote program; repeatable
    #[argh(option, short = 'a', long = "arg")]
    pub args: Vec<String>,

    /// number of runs to dispatch, each with the same stdin
    #[argh(option, short = 'n', long = "count", default = "1")]
    pub count: usize,

    /// path of the local binary
    #[argh(positional)]
    pub binary: String,
}

/// The worker port: `DCEXEC_PORT` when set to a valid port, else the default.
pub fn resolve_port(env_value: Option<&str>) -> anyhow::Result<u16> {
    match env_value {
        None => Ok(DEFAULT_PORT),
        Some(value) => value
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|&port| port != 0)
            .ok_or_else(|| anyhow::anyhow!("{} must be a port number, got '{}'", PORT_ENV, value)),
    }
}

/// Bind address for `dcexec worker`.
pub fn bind_address(bind: Option<&str>, port: u16) -> String {
    match bind {
        Some(bind) => bind.to_string(),
        None => format!("0.0.0.0:{}", port),
    }
}

/// Combines `--policy` and `--weight` into a policy.
pub fn build_policy(policy: &str, weights: &[u32]) -> anyhow::Result<BalancePolicy> {
    let policy: BalancePolicy = policy.parse()?;
    match policy {
        BalancePolicy::WeightedRoundRobin(listed) if listed.is_empty() => {
            Ok(BalancePolicy::WeightedRoundRobin(weights.to_vec()))
        }
        _ if !weights.is_empty() => Err(anyhow::anyhow!(
            "--weight only applies to the weighted policy"
        )),
        policy => Ok(policy),
    }
}

/// Client transport settings for `dcexec run`.
pub fn transport_config(port: u16) -> TransportConfig {
    TransportConfig::default()
        .with_default_port(port)
        .with_connect_timeout(Duration::from_secs(5))
}
