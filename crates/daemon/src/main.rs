// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `jwd` — the jobweave daemon binary.
//!
//! Loads a [`DaemonConfig`], wires up the engine via [`DaemonContext`],
//! reconciles `JobMonitor`s for any parent left non-terminal by a previous
//! run, then spawns the processor/scheduler/reaper/listener tasks and
//! blocks until a shutdown signal arrives.

mod config;
mod context;

use clap::Parser;
use config::DaemonConfig;
use context::DaemonContext;
use jw_core::{JobId, SystemClock};
use jw_engine::{JobMonitor, JobProcessor, Scheduler, StaleReaper};
use jw_wire::{JobFilter, Query, Request, Response};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Grace period the main task waits for spawned tasks to notice shutdown
/// and return before exiting regardless (spec §9 "graceful shutdown").
const SHUTDOWN_HARD_CEILING: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "jwd", about = "jobweave orchestration daemon")]
struct Args {
    /// Path to a TOML config file. Unset keys fall back to their documented
    /// defaults (spec §6).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };

    std::fs::create_dir_all(&config.state_dir)?;
    let _log_guard = init_logging(&config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}

fn init_logging(config: &DaemonConfig) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_path = config.log_path();
    let dir = log_path.parent().unwrap_or(&config.state_dir);
    let file_name = log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("jobweave.log"));
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    Ok(guard)
}

async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    let ctx = Arc::new(DaemonContext::start(config)?);
    info!(state_dir = %ctx.config.state_dir.display(), "jobweave daemon starting");

    reconcile_monitors(&ctx);
    auto_start_definitions(&ctx).await;

    let shutdown = CancellationToken::new();

    let processor = JobProcessor::new(ctx.manager.clone(), ctx.queue.clone(), ctx.steps.clone(), ctx.events.clone())
        .with_concurrency(ctx.config.queue_concurrency)
        .with_heartbeat_interval(ctx.config.worker_heartbeat_interval)
        .with_default_timeout(ctx.config.engine_default_timeout);
    let processor_handle = tokio::spawn(processor.run(shutdown.clone()));

    let scheduler = Arc::new(
        Scheduler::new(ctx.manager.clone(), ctx.dispatcher.clone(), ctx.events.clone(), SystemClock)
            .with_tick_interval(ctx.config.scheduler_tick)
            .with_cooldown(ctx.config.scheduler_cooldown),
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));

    let reaper = StaleReaper::new(ctx.manager.clone())
        .with_threshold(ctx.config.stale_threshold)
        .with_reap_interval(ctx.config.stale_reap_interval);
    let reaper_handle = tokio::spawn(reaper.run(shutdown.clone()));

    let listener_handle = tokio::spawn(run_listener(ctx.clone(), shutdown.clone()));

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, draining in-flight work");
    shutdown.cancel();

    let drain = async {
        let _ = tokio::join!(processor_handle, scheduler_handle, reaper_handle, listener_handle);
    };
    if tokio::time::timeout(SHUTDOWN_HARD_CEILING, drain).await.is_err() {
        warn!("shutdown hard ceiling reached with tasks still running, exiting anyway");
    }

    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler, relying on ctrl-c only");
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

/// Spawn a `JobMonitor` for every parent job a previous run left
/// non-terminal, so crash recovery re-converges the tree (spec §4.7).
fn reconcile_monitors(ctx: &Arc<DaemonContext>) {
    let mut reconciled = 0;
    for job in ctx.manager.all_jobs() {
        if job.parent_id.is_none() && !job.status.is_terminal() {
            let definition_id = job.definition_id.clone();
            let error_tolerance = definition_id
                .as_deref()
                .and_then(|id| ctx.manager.definition(id))
                .map(|def| def.error_tolerance)
                .unwrap_or_default();
            tokio::spawn(JobMonitor::new(ctx.manager.clone(), job.id, error_tolerance).run(ctx.events.clone()));
            reconciled += 1;
        }
    }
    if reconciled > 0 {
        info!(reconciled, "reattached monitors to non-terminal parents from a previous run");
    }
}

/// Submit every enabled definition with `auto_start = true` that has no
/// non-terminal run already in flight, so a definition meant to run once
/// per daemon lifetime (rather than on a `schedule`) fires on startup.
async fn auto_start_definitions(ctx: &Arc<DaemonContext>) {
    for def in ctx.manager.definitions() {
        if !def.enabled || !def.auto_start {
            continue;
        }
        let already_running = ctx
            .manager
            .jobs_by_definition(&def.id)
            .iter()
            .any(|job| job.parent_id.is_none() && !job.status.is_terminal());
        if already_running {
            continue;
        }
        match ctx.submit(&def.id, std::collections::HashMap::new()).await {
            Ok(parent_job_id) => info!(definition_id = %def.id, %parent_job_id, "auto-started definition"),
            Err(e) => warn!(definition_id = %def.id, error = %e, "auto-start failed"),
        }
    }
}

async fn run_listener(ctx: Arc<DaemonContext>, shutdown: CancellationToken) {
    let socket_path = ctx.config.socket_path();
    let _ = std::fs::remove_file(&socket_path);

    let listener = match UnixListener::bind(&socket_path) {
        Ok(l) => l,
        Err(e) => {
            error!(path = %socket_path.display(), error = %e, "failed to bind control socket");
            return;
        }
    };
    if let Ok(metadata) = std::fs::metadata(&socket_path) {
        let mut perms = metadata.permissions();
        perms.set_mode(0o600);
        let _ = std::fs::set_permissions(&socket_path, perms);
    }
    info!(path = %socket_path.display(), "listening for control connections");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = std::fs::remove_file(&socket_path);
                return;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let ctx = ctx.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, ctx, shutdown).await {
                                warn!(error = %e, "control connection ended with an error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                }
            }
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    ctx: Arc<DaemonContext>,
    shutdown: CancellationToken,
) -> Result<(), jw_wire::ProtocolError> {
    let (mut reader, mut writer) = stream.into_split();
    loop {
        let request = match jw_wire::read_request(&mut reader).await {
            Ok(r) => r,
            Err(jw_wire::ProtocolError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e),
        };

        if let Request::Subscribe { job_id, root_id, event_type, min_level } = request {
            return stream_events(&mut writer, &ctx, job_id, root_id, event_type, min_level, shutdown).await;
        }

        let response = handle_request(&ctx, request).await;
        jw_wire::write_response(&mut writer, &response).await?;
    }
}

async fn handle_request(ctx: &DaemonContext, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,
        Request::SubmitDefinition { definition_id, overrides } => {
            match ctx.submit(&definition_id, overrides).await {
                Ok(parent_job_id) => Response::Submitted { parent_job_id: parent_job_id.to_string() },
                Err(e) => Response::Error { message: e.to_string() },
            }
        }
        Request::CancelJob { id } => match parse_job_id(&id) {
            Ok(job_id) => match ctx.manager.cascade_cancel(job_id) {
                Ok(()) => Response::Cancelled { id },
                Err(e) => Response::Error { message: e.to_string() },
            },
            Err(resp) => resp,
        },
        Request::DeleteJob { id } => match parse_job_id(&id) {
            Ok(job_id) => match ctx.manager.cascade_delete(job_id) {
                Ok(()) => Response::Deleted { id },
                Err(e) => Response::Error { message: e.to_string() },
            },
            Err(resp) => resp,
        },
        Request::Query { query } => handle_query(ctx, query),
        Request::Subscribe { .. } => unreachable!("handled by the caller before dispatch"),
    }
}

fn handle_query(ctx: &DaemonContext, query: Query) -> Response {
    match query {
        Query::GetJob { id } => match parse_job_id(&id) {
            Ok(job_id) => Response::Job { job: ctx.manager.get(&job_id) },
            Err(resp) => resp,
        },
        Query::ListJobs { filter } => Response::Jobs { jobs: list_jobs(ctx, &filter) },
        Query::GetProgress { id } => match parse_job_id(&id) {
            Ok(job_id) => Response::Progress { progress: ctx.manager.get(&job_id).map(|j| j.progress) },
            Err(resp) => resp,
        },
        Query::GetLogs { id, since_ms, level, limit } => match parse_job_id(&id) {
            Ok(job_id) => {
                let mut entries = ctx.manager.logs_of(&job_id);
                if let Some(since_ms) = since_ms {
                    entries.retain(|e| e.ts_ms >= since_ms);
                }
                if let Some(level) = level {
                    entries.retain(|e| e.level >= level);
                }
                if let Some(limit) = limit {
                    entries.truncate(limit);
                }
                Response::Logs { entries }
            }
            Err(resp) => resp,
        },
        Query::GetTree { root_id } => match parse_job_id(&root_id) {
            Ok(job_id) => Response::Tree { nodes: collect_tree(ctx, job_id) },
            Err(resp) => resp,
        },
    }
}

/// Breadth-first flatten of `root_id` and every descendant, parents before
/// children, matching `GetTree`'s documented ordering (spec §6).
fn collect_tree(ctx: &DaemonContext, root_id: JobId) -> Vec<jw_core::QueueJob> {
    let mut nodes = Vec::new();
    let Some(root) = ctx.manager.get(&root_id) else { return nodes };
    let mut queue = std::collections::VecDeque::from([root]);
    while let Some(job) = queue.pop_front() {
        let children = ctx.manager.children_of(&job.id);
        nodes.push(job);
        queue.extend(children);
    }
    nodes
}

fn list_jobs(ctx: &DaemonContext, filter: &JobFilter) -> Vec<jw_core::QueueJob> {
    let mut jobs: Vec<jw_core::QueueJob> = ctx
        .manager
        .all_jobs()
        .into_iter()
        .filter(|job| filter.status.map(|s| s == job.status).unwrap_or(true))
        .filter(|job| filter.job_type.as_deref().map(|t| t == job.job_type).unwrap_or(true))
        .filter(|job| {
            filter
                .parent_id
                .as_deref()
                .map(|p| job.parent_id.map(|id| id.to_string()) == Some(p.to_string()))
                .unwrap_or(true)
        })
        .filter(|job| filter.since_ms.map(|since| job.created_at_ms >= since).unwrap_or(true))
        .collect();

    jobs.sort_by_key(|job| std::cmp::Reverse(job.created_at_ms));

    let offset = filter.offset.unwrap_or(0);
    let jobs: Vec<_> = jobs.into_iter().skip(offset).collect();
    match filter.limit {
        Some(limit) => jobs.into_iter().take(limit).collect(),
        None => jobs,
    }
}

async fn stream_events<W: AsyncWrite + Unpin>(
    writer: &mut W,
    ctx: &DaemonContext,
    job_id: Option<String>,
    root_id: Option<String>,
    event_type: Option<String>,
    min_level: Option<jw_core::LogLevel>,
    shutdown: CancellationToken,
) -> Result<(), jw_wire::ProtocolError> {
    // Topic filtering happens client-side here since a single Subscribe can
    // span several job topics (the whole tree rooted at `root_id`); the bus
    // itself only filters by exact topic.
    let root_descendants: Option<std::collections::HashSet<String>> = root_id.as_ref().map(|root| {
        let root_id = match parse_job_id(root) {
            Ok(id) => id,
            Err(_) => return std::collections::HashSet::new(),
        };
        collect_tree(ctx, root_id).into_iter().map(|j| j.id.to_string()).collect()
    });

    let mut subscription = ctx.events.subscribe(None);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            event = subscription.recv() => {
                let Some(event) = event else { return Ok(()) };
                if !event_matches(&event, &job_id, &root_descendants, &event_type, min_level) {
                    continue;
                }
                jw_wire::write_message(writer, &Response::Event { event }).await?;
            }
        }
    }
}

fn event_matches(
    event: &jw_core::Event,
    job_id: &Option<String>,
    root_descendants: &Option<std::collections::HashSet<String>>,
    event_type: &Option<String>,
    min_level: Option<jw_core::LogLevel>,
) -> bool {
    if let Some(level) = min_level {
        if event.level() < level {
            return false;
        }
    }
    if let Some(wanted) = event_type {
        if event_discriminant(event) != *wanted {
            return false;
        }
    }
    let topic = event.topic();
    if let Some(job_id) = job_id {
        if topic != format!("job:{job_id}") {
            return false;
        }
    }
    if let Some(descendants) = root_descendants {
        let Some(event_job) = topic.strip_prefix("job:") else { return false };
        if !descendants.contains(event_job) {
            return false;
        }
    }
    true
}

fn event_discriminant(event: &jw_core::Event) -> String {
    serde_json::to_value(event)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string))
        .unwrap_or_default()
}

fn parse_job_id(id: &str) -> Result<JobId, Response> {
    id.parse::<JobId>().map_err(|_| Response::Error { message: format!("'{id}' is not a valid job id") })
}
