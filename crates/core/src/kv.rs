// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key-value store backing placeholder substitution (spec §4.5).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvEntry {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

crate::builder! {
    pub struct KvEntryBuilder => KvEntry {
        into {
            key: String = "test.key",
            value: String = "test-value",
        }
        set {}
        option {
            description: String = None,
        }
        computed {}
    }
}
