//! Listen command implementation
//!
//! This module implements the `listen` command, which runs the inbound
//! listener until a shutdown signal arrives.

use super::{engine_registry, load_or_default};
use crate::adapters::audit::sink_from_config;
use crate::adapters::transport::{Framing, MllpListener};
use crate::core::dispatcher::Dispatcher;
use crate::core::intake::IntakeService;
use clap::Args;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the listen command
#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Override the bind address (e.g. 127.0.0.1:2575)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Override the framing (mllp or raw)
    #[arg(long)]
    pub framing: Option<Framing>,

    /// Override max concurrent connections
    #[arg(long)]
    pub max_connections: Option<usize>,
}

impl ListenArgs {
    /// Execute the listen command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting listen command");

        let mut config = match load_or_default(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        // Apply CLI overrides
        if let Some(bind) = &self.bind {
            tracing::info!(bind = %bind, "Overriding bind address from CLI");
            config.listener.bind_address = bind.clone();
        }
        if let Some(framing) = self.framing {
            config.listener.framing = framing;
        }
        if let Some(max) = self.max_connections {
            config.listener.max_connections = max;
        }

        if let Err(e) = config.validate() {
            println!("❌ Configuration validation failed");
            println!("   Error: {e}");
            return Ok(2); // Configuration error exit code
        }

        let audit = match sink_from_config(&config.audit) {
            Ok(sink) => sink,
            Err(e) => {
                println!("❌ Failed to open audit log");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let intake = IntakeService::new(Dispatcher::new(Arc::new(engine_registry())), audit)
            .with_deadline(config.engine.dispatch_deadline());

        let listener = match MllpListener::bind(&config.listener, intake).await {
            Ok(l) => l,
            Err(e) => {
                println!("❌ Failed to bind {}", config.listener.bind_address);
                println!("   Error: {e}");
                return Ok(4); // Connection error exit code
            }
        };

        let address = listener.local_addr()?;
        println!("📡 Listening on {address} ({})", config.listener.framing);
        println!("   Press Ctrl+C to stop");

        listener.run(shutdown_signal).await?;

        println!("✅ Listener stopped");
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_args_defaults() {
        let args = ListenArgs {
            bind: None,
            framing: None,
            max_connections: None,
        };
        assert!(args.bind.is_none());
        assert!(args.framing.is_none());
    }

    #[tokio::test]
    async fn test_invalid_bind_override_is_config_error() {
        let args = ListenArgs {
            bind: Some("not-an-address".to_string()),
            framing: None,
            max_connections: None,
        };
        let (_tx, rx) = watch::channel(false);
        let code = args.execute("/nonexistent/caduceus.toml", rx).await.unwrap();
        assert_eq!(code, 2);
    }
}
