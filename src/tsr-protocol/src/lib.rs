// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! JSON line control protocol for tsr-rs.
//!
//! This crate defines the commands an orchestrator sends to the server, the
//! responses it gets back, and the token checks applied to them.

pub mod auth;
pub mod codec;
pub mod types;

// Re-export commonly used items
pub use auth::{AuthError, AuthScope, NoAuthValidator, SimpleTokenValidator, TokenValidator};
pub use codec::{encode_response, parse_envelope};
pub use types::{ClientCommand, ClientEnvelope, ClientResponse, DeviceReport};
