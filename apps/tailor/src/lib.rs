//! Resume tailoring engines: skill reconciliation and bullet selection for scraped
//! job postings, behind narrow ports for completion, storage and an operator.

pub mod batch;
pub mod bullets;
pub mod config;
pub mod db;
pub mod errors;
pub mod fit;
pub mod human;
pub mod llm_client;
pub mod models;
pub mod retry;
pub mod routes;
pub mod skills;
pub mod state;
pub mod store;
pub mod tailoring;

#[cfg(test)]
mod testing;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes structured logging for either binary. `RUST_LOG` wins when set.
pub fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "tailor={level},tailor_batch={level},tower_http={level}"
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
