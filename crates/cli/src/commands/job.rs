// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `jw submit|get|list|progress|logs|tree|cancel|delete|subscribe` — the
//! Submit/Query/Control/Subscribe surface from spec §6, one subcommand per
//! request variant.

use crate::client::{response_or_error, DaemonClient};
use crate::output::{format_or_json, OutputFormat};
use anyhow::{anyhow, Result};
use clap::Args;
use jw_core::{JobStatus, LogLevel};
use jw_wire::{JobFilter, Query, Request, Response};
use std::collections::HashMap;

#[derive(Args)]
pub struct SubmitArgs {
    pub definition_id: String,
    /// `key=value` override, repeatable, merged over the definition's own
    /// config before placeholder resolution.
    #[arg(long = "set", value_parser = parse_key_value)]
    pub overrides: Vec<(String, String)>,
}

pub async fn submit(socket: &std::path::Path, args: SubmitArgs, format: OutputFormat) -> Result<()> {
    let overrides: HashMap<String, String> = args.overrides.into_iter().collect();
    let mut client = DaemonClient::connect(socket).await?;
    let response = response_or_error(
        client.send(Request::SubmitDefinition { definition_id: args.definition_id, overrides }).await?,
    )?;
    match response {
        Response::Submitted { parent_job_id } => format_or_json(
            format,
            &serde_json::json!({ "parent_job_id": parent_job_id }),
            || println!("submitted: {parent_job_id}"),
        ),
        other => Err(anyhow!("unexpected response: {other:?}")),
    }
}

#[derive(Args)]
pub struct GetArgs {
    pub id: String,
}

pub async fn get(socket: &std::path::Path, args: GetArgs, format: OutputFormat) -> Result<()> {
    let mut client = DaemonClient::connect(socket).await?;
    let response = response_or_error(client.send(Request::Query { query: Query::GetJob { id: args.id } }).await?)?;
    match response {
        Response::Job { job: Some(job) } => format_or_json(format, &job, || print_job_line(&job)),
        Response::Job { job: None } => Err(anyhow!("job not found")),
        other => Err(anyhow!("unexpected response: {other:?}")),
    }
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,
    #[arg(long)]
    pub job_type: Option<String>,
    #[arg(long)]
    pub parent_id: Option<String>,
    #[arg(long)]
    pub limit: Option<usize>,
    #[arg(long)]
    pub offset: Option<usize>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum StatusArg {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl From<StatusArg> for JobStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Pending => JobStatus::Pending,
            StatusArg::Running => JobStatus::Running,
            StatusArg::Completed => JobStatus::Completed,
            StatusArg::Failed => JobStatus::Failed,
            StatusArg::Cancelled => JobStatus::Cancelled,
        }
    }
}

pub async fn list(socket: &std::path::Path, args: ListArgs, format: OutputFormat) -> Result<()> {
    let filter = JobFilter {
        status: args.status.map(Into::into),
        job_type: args.job_type,
        parent_id: args.parent_id,
        since_ms: None,
        limit: args.limit,
        offset: args.offset,
    };
    let mut client = DaemonClient::connect(socket).await?;
    let response = response_or_error(client.send(Request::Query { query: Query::ListJobs { filter } }).await?)?;
    match response {
        Response::Jobs { jobs } => format_or_json(format, &jobs, || {
            if jobs.is_empty() {
                println!("no jobs");
            }
            for job in &jobs {
                print_job_line(job);
            }
        }),
        other => Err(anyhow!("unexpected response: {other:?}")),
    }
}

#[derive(Args)]
pub struct ProgressArgs {
    pub id: String,
}

pub async fn progress(socket: &std::path::Path, args: ProgressArgs, format: OutputFormat) -> Result<()> {
    let mut client = DaemonClient::connect(socket).await?;
    let response =
        response_or_error(client.send(Request::Query { query: Query::GetProgress { id: args.id } }).await?)?;
    match response {
        Response::Progress { progress: Some(p) } => format_or_json(format, &p, || {
            println!("{}/{} completed, {} failed, {} pending (of {})", p.completed, p.total, p.failed, p.pending, p.total);
        }),
        Response::Progress { progress: None } => Err(anyhow!("job not found")),
        other => Err(anyhow!("unexpected response: {other:?}")),
    }
}

#[derive(Args)]
pub struct LogsArgs {
    pub id: String,
    #[arg(long)]
    pub since_ms: Option<u64>,
    #[arg(long, value_enum)]
    pub level: Option<LevelArg>,
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum LevelArg {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LevelArg> for LogLevel {
    fn from(value: LevelArg) -> Self {
        match value {
            LevelArg::Debug => LogLevel::Debug,
            LevelArg::Info => LogLevel::Info,
            LevelArg::Warn => LogLevel::Warn,
            LevelArg::Error => LogLevel::Error,
        }
    }
}

pub async fn logs(socket: &std::path::Path, args: LogsArgs, format: OutputFormat) -> Result<()> {
    let query = Query::GetLogs {
        id: args.id,
        since_ms: args.since_ms,
        level: args.level.map(Into::into),
        limit: args.limit,
    };
    let mut client = DaemonClient::connect(socket).await?;
    let response = response_or_error(client.send(Request::Query { query }).await?)?;
    match response {
        Response::Logs { entries } => format_or_json(format, &entries, || {
            for entry in &entries {
                println!("[{}] {} {}", entry.ts_ms, entry.level, entry.message);
            }
        }),
        other => Err(anyhow!("unexpected response: {other:?}")),
    }
}

#[derive(Args)]
pub struct TreeArgs {
    pub root_id: String,
}

pub async fn tree(socket: &std::path::Path, args: TreeArgs, format: OutputFormat) -> Result<()> {
    let mut client = DaemonClient::connect(socket).await?;
    let response = response_or_error(client.send(Request::Query { query: Query::GetTree { root_id: args.root_id } }).await?)?;
    match response {
        Response::Tree { nodes } => format_or_json(format, &nodes, || {
            for node in &nodes {
                let indent = "  ".repeat(node.depth as usize);
                println!("{indent}{} [{}] {}", node.name, node.status, node.id);
            }
        }),
        other => Err(anyhow!("unexpected response: {other:?}")),
    }
}

#[derive(Args)]
pub struct CancelArgs {
    pub id: String,
}

pub async fn cancel(socket: &std::path::Path, args: CancelArgs, format: OutputFormat) -> Result<()> {
    let mut client = DaemonClient::connect(socket).await?;
    let response = response_or_error(client.send(Request::CancelJob { id: args.id }).await?)?;
    match response {
        Response::Cancelled { id } => {
            format_or_json(format, &serde_json::json!({ "cancelled": id }), || println!("cancelled: {id}"))
        }
        other => Err(anyhow!("unexpected response: {other:?}")),
    }
}

#[derive(Args)]
pub struct DeleteArgs {
    pub id: String,
}

pub async fn delete(socket: &std::path::Path, args: DeleteArgs, format: OutputFormat) -> Result<()> {
    let mut client = DaemonClient::connect(socket).await?;
    let response = response_or_error(client.send(Request::DeleteJob { id: args.id }).await?)?;
    match response {
        Response::Deleted { id } => {
            format_or_json(format, &serde_json::json!({ "deleted": id }), || println!("deleted: {id}"))
        }
        other => Err(anyhow!("unexpected response: {other:?}")),
    }
}

#[derive(Args)]
pub struct SubscribeArgs {
    #[arg(long)]
    pub job_id: Option<String>,
    #[arg(long)]
    pub root_id: Option<String>,
    #[arg(long)]
    pub event_type: Option<String>,
    #[arg(long, value_enum)]
    pub min_level: Option<LevelArg>,
}

pub async fn subscribe(socket: &std::path::Path, args: SubscribeArgs) -> Result<()> {
    let client = DaemonClient::connect(socket).await?;
    let request = Request::Subscribe {
        job_id: args.job_id,
        root_id: args.root_id,
        event_type: args.event_type,
        min_level: args.min_level.map(Into::into),
    };
    let stream = client.stream_events(request, |event| {
        println!("{}", serde_json::to_string(&event).unwrap_or_default());
    });
    tokio::select! {
        result = stream => result,
        _ = tokio::signal::ctrl_c() => Ok(()),
    }
}

fn print_job_line(job: &jw_core::QueueJob) {
    println!("{}  {:<10} {:<10} {}", job.id, job.status, job.job_type, job.name);
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) =
        raw.split_once('=').ok_or_else(|| format!("'{raw}' is not in key=value form"))?;
    Ok((key.to_string(), value.to_string()))
}
