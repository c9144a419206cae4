// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for Atrium crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`api`] - Scripted persistence API (queued replies, delays, hangs)
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`fixtures`] - `Task` / `Deal` entities and pre-seeded sessions
//! - [`render`] - Render port that records commits
//! - [`transport`] - Scripted realtime transport

pub mod api;
pub mod config;
pub mod fixtures;
pub mod render;
pub mod transport;

pub use api::{Call, Reply, ScriptedApi};
pub use config::InMemoryConfigStore;
pub use fixtures::{deal, session, session_with_tasks, task, task_ids, Deal, Task, WORKSPACE};
pub use render::RecordingRenderPort;
pub use transport::ScriptedTransport;
