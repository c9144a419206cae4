// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Network adapters for the Atrium sync engine: REST persistence over
//! `reqwest` and realtime subscriptions over a Unix socket
//! (newline-delimited JSON).

pub mod http;
pub mod realtime;

pub use http::HttpPersistence;
pub use realtime::UnixRealtimeTransport;
