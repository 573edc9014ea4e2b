use serde::{Deserialize, Serialize};

/// Where group data lives inside host documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Key under the container's `extensions` object holding the prompt group list
    pub storage_key: String,

    /// Container holding world-info groups for every book
    pub world_info_container: String,

    /// Key inside `world_info_container` holding the per-book mapping
    pub world_info_key: String,

    /// Label used when a stored group has no usable name
    pub default_group_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_key: "prompt_groups".to_string(),
            world_info_container: "extension_settings".to_string(),
            world_info_key: "world_info_groups".to_string(),
            default_group_name: crate::model::DEFAULT_GROUP_NAME.to_string(),
        }
    }
}

impl StoreConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.storage_key.trim().is_empty() {
            return Err("storage_key must not be empty".to_string());
        }
        if self.world_info_container.trim().is_empty() {
            return Err("world_info_container must not be empty".to_string());
        }
        if self.world_info_key.trim().is_empty() {
            return Err("world_info_key must not be empty".to_string());
        }
        if self.default_group_name.trim().is_empty() {
            return Err("default_group_name must not be empty".to_string());
        }
        Ok(())
    }
}
