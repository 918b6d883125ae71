//! # Lucky Draw service
//!
//! Runs an [`EventRegistry`](lucky_draw_core::EventRegistry) behind a JSON-lines
//! command protocol on stdin/stdout.
//!
//! - [`config`]: environment-driven configuration
//! - [`quota`]: quota resolution from role labels
//! - [`commands`]: request/response types and dispatch to the registry
//! - [`server`]: the concurrent request loop
//! - [`bootstrap`]: backend construction and registry loading

pub mod bootstrap;
pub mod commands;
pub mod config;
pub mod quota;
pub mod server;

pub use commands::{CommandHandler, Request, Response};
pub use config::Config;
pub use quota::{QuotaResolver, RoleTierQuota};
