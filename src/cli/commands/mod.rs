//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod convert;
pub mod init;
pub mod listen;
pub mod parse;
pub mod send;
pub mod status;
pub mod validate;

use crate::config::{load_config, CaduceusConfig};
use crate::core::registry::{AcceptingHandler, MessageTypeRegistry, RegistryBuilder};
use crate::domain::Result;
use std::path::Path;
use std::sync::Arc;

/// Standard templates with the accepting handler behind each
pub(crate) fn engine_registry() -> MessageTypeRegistry {
    RegistryBuilder::new()
        .with_standard_templates()
        .handler_for_templates(Arc::new(AcceptingHandler))
        .build()
}

/// Loads the configuration file, or defaults when there is none
pub(crate) fn load_or_default(config_path: &str) -> Result<CaduceusConfig> {
    if Path::new(config_path).exists() {
        load_config(config_path)
    } else {
        tracing::debug!(config_path = %config_path, "No configuration file, using defaults");
        Ok(CaduceusConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageKey;

    #[test]
    fn test_engine_registry_handles_every_template() {
        let registry = engine_registry();
        assert_eq!(registry.handler_keys(), registry.template_keys());
        assert!(registry.handler(&MessageKey::ORU_R01).is_some());
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = load_or_default("/nonexistent/caduceus.toml").unwrap();
        assert_eq!(config.engine.sending_application, "CADUCEUS");
    }
}
