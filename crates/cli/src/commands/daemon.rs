// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `jw daemon start|stop|status` — PID-file-based process lifecycle
//! management for the background daemon.

use crate::client::DaemonClient;
use crate::output::{format_or_json, OutputFormat};
use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use jw_wire::{Request, Response};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon in the background
    Start,
    /// Send the running daemon SIGTERM
    Stop,
    /// Ping the daemon and report whether it's up
    Status,
}

pub async fn daemon(args: DaemonArgs, state_dir: &Path, format: OutputFormat) -> Result<()> {
    match args.command {
        DaemonCommand::Start => start(state_dir).await,
        DaemonCommand::Stop => stop(state_dir, format).await,
        DaemonCommand::Status => status(state_dir, format).await,
    }
}

async fn start(state_dir: &Path) -> Result<()> {
    let socket = crate::paths::socket_path(state_dir);
    if DaemonClient::connect(&socket).await.is_ok() {
        println!("daemon already running");
        return Ok(());
    }

    let jwd = find_jwd_binary()?;
    let child = Command::new(&jwd).spawn().with_context(|| format!("spawning {}", jwd.display()))?;
    println!("daemon started (pid {})", child.id());
    Ok(())
}

async fn stop(state_dir: &Path, format: OutputFormat) -> Result<()> {
    let lock_path = crate::paths::lock_path(state_dir);
    let pid = match std::fs::read_to_string(&lock_path) {
        Ok(contents) => contents.trim().parse::<i32>().ok(),
        Err(_) => None,
    };
    let Some(pid) = pid else {
        return format_or_json(format, &serde_json::json!({ "status": "not_running" }), || {
            println!("daemon not running")
        });
    };

    kill(Pid::from_raw(pid), Signal::SIGTERM)
        .map_err(|e| anyhow!("sending SIGTERM to pid {pid}: {e}"))?;
    format_or_json(format, &serde_json::json!({ "stopped_pid": pid }), || println!("daemon stopped (pid {pid})"))
}

async fn status(state_dir: &Path, format: OutputFormat) -> Result<()> {
    let socket = crate::paths::socket_path(state_dir);
    let mut client = match DaemonClient::connect(&socket).await {
        Ok(c) => c,
        Err(_) => {
            return format_or_json(format, &serde_json::json!({ "status": "not_running" }), || {
                println!("daemon not running")
            })
        }
    };
    match client.send(Request::Ping).await? {
        Response::Pong => {
            format_or_json(format, &serde_json::json!({ "status": "running" }), || println!("daemon running"))
        }
        other => Err(anyhow!("unexpected response to Ping: {other:?}")),
    }
}

/// Locate the `jwd` binary: next to the CLI's own executable first (the
/// common case for an installed pair), falling back to `PATH`.
fn find_jwd_binary() -> Result<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("jwd");
            if sibling.exists() {
                return Ok(sibling);
            }
        }
    }
    Ok(PathBuf::from("jwd"))
}
