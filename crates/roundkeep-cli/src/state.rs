//! On-disk state for the CLI: one JSON file holding every event snapshot.

use std::path::Path;

use anyhow::{Context, Result};
use roundkeep_core::{EngineConfig, EventSnapshot, MemoryRoundStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub events: Vec<EventSnapshot>,
}

/// Load the store from `path`. A missing file yields an empty store.
pub async fn load_store(path: &Path) -> Result<MemoryRoundStore> {
    if !path.exists() {
        debug!("state file {:?} not found, starting empty", path);
        return Ok(MemoryRoundStore::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file: {:?}", path))?;
    let state: StateFile =
        serde_json::from_str(&content).with_context(|| format!("Invalid state file {:?}", path))?;
    MemoryRoundStore::from_snapshots(state.events)
        .await
        .with_context(|| format!("State file {:?} violates round invariants", path))
}

/// Write the store back to `path`, replacing it in one rename.
pub async fn save_store(path: &Path, store: &MemoryRoundStore) -> Result<()> {
    let state = StateFile {
        events: store.export().await,
    };
    let json = serde_json::to_string_pretty(&state)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("Failed to write {:?}", tmp))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Failed to replace {:?}", path))?;
    Ok(())
}

/// Engine config from an optional TOML file, then `ROUNDKEEP_*` env vars.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str::<EngineConfig>(&content)
                .with_context(|| format!("Invalid config in {:?}", path))?
                .overlay_env()
        }
        None => EngineConfig::from_env(),
    };
    config.validate()?;
    Ok(config)
}
