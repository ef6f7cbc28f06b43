// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `jw` — the jobweave control-plane client, talking to `jwd` over its
//! Unix domain socket (spec §6).

mod client;
mod commands;
mod output;
mod paths;

use clap::{Parser, Subcommand};
use commands::daemon::{daemon, DaemonArgs};
use commands::job;
use output::OutputFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "jw", about = "jobweave control-plane client")]
struct Cli {
    /// Override the daemon's state directory (defaults to the platform
    /// state dir, matching `jwd`'s own default).
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[arg(long, value_enum, global = true, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expand a definition into a running job tree
    Submit(job::SubmitArgs),
    /// Fetch a single job
    Get(job::GetArgs),
    /// List jobs, optionally filtered
    List(job::ListArgs),
    /// Fetch a job's rollup progress
    Progress(job::ProgressArgs),
    /// Fetch a job's log lines
    Logs(job::LogsArgs),
    /// Fetch a job's subtree, parents before children
    Tree(job::TreeArgs),
    /// Cascade-cancel a job and its descendants
    Cancel(job::CancelArgs),
    /// Cascade-delete a job and its descendants
    Delete(job::DeleteArgs),
    /// Open a live event stream
    Subscribe(job::SubscribeArgs),
    /// Manage the `jwd` process
    Daemon(DaemonArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let state_dir = cli.state_dir.unwrap_or_else(paths::default_state_dir);
    let socket = paths::socket_path(&state_dir);

    match cli.command {
        Command::Submit(args) => job::submit(&socket, args, cli.output).await,
        Command::Get(args) => job::get(&socket, args, cli.output).await,
        Command::List(args) => job::list(&socket, args, cli.output).await,
        Command::Progress(args) => job::progress(&socket, args, cli.output).await,
        Command::Logs(args) => job::logs(&socket, args, cli.output).await,
        Command::Tree(args) => job::tree(&socket, args, cli.output).await,
        Command::Cancel(args) => job::cancel(&socket, args, cli.output).await,
        Command::Delete(args) => job::delete(&socket, args, cli.output).await,
        Command::Subscribe(args) => job::subscribe(&socket, args).await,
        Command::Daemon(args) => daemon(args, &state_dir, cli.output).await,
    }
}
