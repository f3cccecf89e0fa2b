// packages/engine/src/main.rs
//! Rewire Engine
//!
//! Alias diagnostic: prints the module key every specifier argument resolves
//! to from the configured harness, using the alias config the engine would
//! load.

use anyhow::{Context, Result};
use rewire_engine::module::loader::RealFileSystem;
use rewire_engine::observability::{init_metrics, init_tracing};
use rewire_engine::resolver::{AliasTable, SpecifierResolver};
use rewire_engine::utils::config::EngineConfig;
use rewire_engine::EngineError;
use tracing::{info, warn};

fn main() -> Result<()> {
    // Load configuration
    let config = EngineConfig::load().context("Failed to load engine configuration")?;

    // Initialize observability (tracing, metrics)
    init_tracing(&config.observability).map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
    init_metrics();

    info!("Starting Rewire Engine v{}", env!("CARGO_PKG_VERSION"));

    let cwd = std::env::current_dir()?;
    let aliases = match AliasTable::read(&config.resolver, &cwd) {
        Ok(table) => table,
        Err(EngineError::ConfigError { candidates }) if config.resolver.config_path.is_none() => {
            warn!("No alias config found (tried {}), resolving without aliases", candidates.join(", "));
            AliasTable::new()
        }
        Err(e) => return Err(e).context("Failed to read alias config"),
    };
    info!("Alias table has {} entries", aliases.entries().len());

    let resolver = SpecifierResolver::new(aliases);
    let harness = &config.resolver.harness;

    for specifier in std::env::args().skip(1) {
        let key = resolver.resolve(&specifier, harness, &RealFileSystem);
        println!("{} -> {}", specifier, key);
    }

    Ok(())
}
