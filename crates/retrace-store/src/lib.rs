// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-endpoint S3-compatible object storage for Retrace artifacts.
//!
//! Requests are signed with SigV4 directly over reqwest; the endpoint
//! catalog lives in SQLite and is resolved through [`EndpointResolver`],
//! with secrets kept as references until a client is built.

pub mod client;
pub mod keys;
pub mod resolver;
pub mod sign;
pub mod store;

pub use client::EndpointClient;
pub use resolver::{EndpointResolver, EnvSecretResolver, SecretResolver};
pub use store::ArtifactStore;
