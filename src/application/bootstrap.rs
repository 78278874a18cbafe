use std::fs;
use std::path::{Path, PathBuf};

use crate::infrastructure::config::ensure_default_configs;
use crate::infrastructure::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub logs_dir: PathBuf,
}

/// Creates the on-disk layout the session needs: `config/` with default
/// config files and `logs/` for the operation log. Idempotent.
pub fn bootstrap_workspace(workspace_root: &Path) -> Result<WorkspaceLayout, CoreError> {
    let config_dir = workspace_root.join("config");
    let logs_dir = workspace_root.join("logs");

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&logs_dir)?;
    ensure_default_configs(&config_dir)?;

    Ok(WorkspaceLayout {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        logs_dir,
    })
}
