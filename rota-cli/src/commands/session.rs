//! Shared plumbing for commands that talk to the engine

use anyhow::Context as _;
use rota_core::{Config, OpContext, ReviewEngine};
use rota_db::{Database, SqliteStore};
use serde::Serialize;

/// Open database plus engine for a single command invocation
pub struct Session {
    engine: ReviewEngine<SqliteStore>,
    config: Config,
}

impl Session {
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let path = match &config.database.path {
            Some(path) => path.clone(),
            None => Database::default_path()?,
        };
        let db = Database::connect(&path, config.database.max_connections)
            .await
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        tracing::debug!(path = %path.display(), seed = ?config.assignment.seed, "Session opened");

        Ok(Self {
            engine: ReviewEngine::from_seed(db.store(), config.assignment.seed),
            config: config.clone(),
        })
    }

    pub fn engine(&self) -> &ReviewEngine<SqliteStore> {
        &self.engine
    }

    /// Context carrying the configured deadline, cancelled on Ctrl-C
    pub fn op_context(&self) -> OpContext {
        let mut cx = OpContext::background();
        if let Some(timeout) = self.config.assignment.operation_timeout {
            cx = cx.with_timeout(timeout);
        }

        let token = cx.token().clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling operation");
                token.cancel();
            }
        });

        cx
    }
}

/// Print a result as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
