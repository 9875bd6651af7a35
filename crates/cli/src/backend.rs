//! Wires an `agdir_config::Config` into a concrete `StoreBackend` (spec.md
//! §9: "the core must never branch on backend type outside these
//! implementations" — this is the one place that's allowed to).

use std::path::PathBuf;
use std::sync::Arc;

use agdir_oci::{GenericRegistry, LocalDir, RegistryAuthConfig, StoreBackend, ZotRegistry};

use agdir_config::{Config, RegistryType};

use crate::error::CliError;

pub fn build_backend(config: &Config) -> Result<Arc<dyn StoreBackend>, CliError> {
    if let Some(local_dir) = &config.registry.local_dir {
        return Ok(Arc::new(LocalDir::new(PathBuf::from(local_dir))));
    }

    let auth = RegistryAuthConfig {
        username: config.registry.auth.username.clone(),
        password: config.registry.auth.password.clone(),
        refresh_token: config.registry.auth.refresh_token.clone(),
        access_token: config.registry.auth.access_token.clone(),
        insecure: config.registry.auth.insecure,
    };

    match config.registry.r#type {
        RegistryType::Zot => Ok(Arc::new(ZotRegistry::new(config.registry.address.clone(), config.registry.repository.clone(), auth))),
        RegistryType::Generic | RegistryType::Other => {
            Ok(Arc::new(GenericRegistry::new(config.registry.address.clone(), config.registry.repository.clone(), auth)))
        }
    }
}

/// A `ZotRegistry` handle, if the configured backend is one — needed
/// separately because `Sign`/`Verify` want the fast-path only when Zot is
/// actually in play.
pub fn build_zot(config: &Config) -> Option<Arc<ZotRegistry>> {
    if config.registry.local_dir.is_some() || config.registry.r#type != RegistryType::Zot {
        return None;
    }
    let auth = RegistryAuthConfig {
        username: config.registry.auth.username.clone(),
        password: config.registry.auth.password.clone(),
        refresh_token: config.registry.auth.refresh_token.clone(),
        access_token: config.registry.auth.access_token.clone(),
        insecure: config.registry.auth.insecure,
    };
    Some(Arc::new(ZotRegistry::new(config.registry.address.clone(), config.registry.repository.clone(), auth)))
}
