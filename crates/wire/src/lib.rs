// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Wire DTOs and framing for `jw_wire`, the daemon's Unix-domain-socket
//! control protocol: Submit/Query/Control requests, their responses, and
//! the `Subscribe` event stream.

mod query;
mod request;
mod response;
mod wire;

pub use query::{JobFilter, Query};
pub use request::Request;
pub use response::Response;
pub use wire::{
    decode, encode, read_message, read_request, write_message, write_response, ProtocolError,
    DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE,
};
