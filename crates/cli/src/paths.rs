// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State directory / socket / lock path derivation, mirroring
//! `jw-daemon`'s `DaemonConfig` defaults so the CLI finds the same daemon
//! without depending on the daemon crate (it has no lib target).

use std::path::PathBuf;

pub fn default_state_dir() -> PathBuf {
    dirs::state_dir().or_else(dirs::home_dir).unwrap_or_else(|| PathBuf::from(".")).join("jobweave")
}

pub fn socket_path(state_dir: &std::path::Path) -> PathBuf {
    state_dir.join("jobweave.sock")
}

pub fn lock_path(state_dir: &std::path::Path) -> PathBuf {
    state_dir.join("jobweave.pid")
}
