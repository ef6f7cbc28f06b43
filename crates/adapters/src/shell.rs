// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `shell` job worker: runs a single `command` against `tokio::process`,
//! piping stdout/stderr and reporting the exit code.
//!
//! This is a deliberately narrow adapter — one command, no pipelines, no
//! redirections, no variable expansion — unlike a full shell interpreter.
//! A job that needs a pipeline should use several `shell` steps joined by
//! `depends`, not a single command string.

use async_trait::async_trait;
use jw_core::{EngineError, JobId, WorkerOutcome};
use std::collections::HashMap;

/// Bytes of stdout/stderr retained in the failure message; matches the
/// teacher's command-trace snippet cap so large output doesn't blow up the
/// error field.
const SNIPPET_LIMIT: usize = 4096;

pub struct ShellJobWorker;

#[async_trait]
impl jw_core::JobWorker for ShellJobWorker {
    fn job_type(&self) -> &str {
        "shell"
    }

    fn validate(&self, config: &HashMap<String, String>) -> Result<(), EngineError> {
        match config.get("command").map(|s| s.trim()) {
            Some(cmd) if !cmd.is_empty() => Ok(()),
            _ => Err(EngineError::InvalidType("shell job requires a non-empty 'command' config key".to_string())),
        }
    }

    async fn execute(&self, job_id: JobId, config: &HashMap<String, String>) -> WorkerOutcome {
        let command = config.get("command").cloned().unwrap_or_default();
        let cwd = config.get("cwd").cloned();

        let parts: Vec<&str> = command.split_whitespace().collect();
        let Some((program, args)) = parts.split_first() else {
            return WorkerOutcome::Permanent("shell job requires a non-empty 'command' config key".to_string());
        };

        let mut process = tokio::process::Command::new(program);
        process.args(args);
        process.stdout(std::process::Stdio::piped());
        process.stderr(std::process::Stdio::piped());
        if let Some(cwd) = &cwd {
            process.current_dir(cwd);
        }

        tracing::debug!(%job_id, %command, "spawning shell job");

        let output = match process.output().await {
            Ok(output) => output,
            Err(e) => return WorkerOutcome::Permanent(format!("Exec: failed to spawn '{program}': {e}")),
        };

        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code == 0 {
            WorkerOutcome::Ok(1)
        } else {
            let stderr = truncate_snippet(&output.stderr, SNIPPET_LIMIT);
            WorkerOutcome::Permanent(format!("Exec: '{command}' exited {exit_code}: {stderr}"))
        }
    }
}

fn truncate_snippet(bytes: &[u8], limit: usize) -> String {
    let s = String::from_utf8_lossy(bytes);
    if s.len() <= limit {
        return s.into_owned();
    }
    let mut end = limit.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jw_core::JobWorker;

    fn config(command: &str) -> HashMap<String, String> {
        let mut c = HashMap::new();
        c.insert("command".to_string(), command.to_string());
        c
    }

    #[test]
    fn validate_rejects_a_missing_command() {
        let err = ShellJobWorker.validate(&HashMap::new()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidType(_)));
    }

    #[test]
    fn validate_rejects_a_blank_command() {
        let err = ShellJobWorker.validate(&config("   ")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidType(_)));
    }

    #[test]
    fn validate_accepts_a_real_command() {
        assert!(ShellJobWorker.validate(&config("true")).is_ok());
    }

    #[tokio::test]
    async fn a_zero_exit_completes_the_job() {
        let outcome = ShellJobWorker.execute(JobId::new(), &config("true")).await;
        assert!(matches!(outcome, WorkerOutcome::Ok(1)));
    }

    #[tokio::test]
    async fn a_nonzero_exit_is_a_permanent_failure_with_exit_code_in_the_message() {
        let outcome = ShellJobWorker.execute(JobId::new(), &config("false")).await;
        match outcome {
            WorkerOutcome::Permanent(msg) => assert!(msg.contains("exited 1")),
            other => panic!("expected Permanent, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn an_unresolvable_program_fails_permanently_rather_than_panicking() {
        let outcome = ShellJobWorker.execute(JobId::new(), &config("definitely-not-a-real-binary-xyz")).await;
        assert!(matches!(outcome, WorkerOutcome::Permanent(_)));
    }
}
