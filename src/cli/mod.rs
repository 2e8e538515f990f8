//! CLI module for the Indulink response cache
//!
//! - `serve`: run the HTTP API with the response cache mounted
//! - `stats`, `invalidate`, `invalidate-user`, `invalidate-endpoint`, `flush`:
//!   one-shot cache administration against the configured store

pub mod cache;
pub mod serve;

use clap::{Parser, Subcommand};

/// Indulink response cache
#[derive(Parser)]
#[command(name = "indulink-cache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server
    Serve,

    /// Print cache connection status and backend diagnostics as JSON
    Stats,

    /// Delete every cached response matching a key or glob pattern
    Invalidate {
        /// Exact key or pattern containing `*`, e.g. `GET:*:/api/products*`
        pattern: String,
    },

    /// Delete every cached response for one user
    InvalidateUser {
        user_id: String,
    },

    /// Delete every cached GET response under an endpoint prefix
    InvalidateEndpoint {
        /// URL prefix, e.g. `/api/products`
        endpoint: String,
    },

    /// Remove every entry from the cache store
    Flush,
}
