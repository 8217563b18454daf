//! Persistence for the state file in `<workspace>/.codi-repo/`.

use super::StateFile;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory name for codi-repo metadata within the workspace.
const STATE_DIR: &str = ".codi-repo";

/// Filename for the state file.
const STATE_FILE: &str = "state.json";

/// Get path to the state file.
pub fn state_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(STATE_DIR).join(STATE_FILE)
}

/// Load state from disk.
///
/// Returns an empty `StateFile` if the file doesn't exist.
pub fn load_state(workspace_root: &Path) -> Result<StateFile> {
    let path = state_path(workspace_root);

    if !path.exists() {
        return Ok(StateFile::new());
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| Error::State(format!("failed to read {}: {e}", path.display())))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::State(format!("failed to parse {}: {e}", path.display())))
}

/// Save state to disk, replacing the whole file.
///
/// Writes a sibling temp file and renames it into place so a crash never
/// leaves a truncated file behind.
pub fn save_state(workspace_root: &Path, state: &StateFile) -> Result<()> {
    let dir = workspace_root.join(STATE_DIR);
    let path = dir.join(STATE_FILE);

    fs::create_dir_all(&dir)
        .map_err(|e| Error::State(format!("failed to create {}: {e}", dir.display())))?;

    let content = serde_json::to_string_pretty(state)
        .map_err(|e| Error::State(format!("failed to serialize state: {e}")))?;

    let tmp = dir.join(format!("{STATE_FILE}.tmp"));
    fs::write(&tmp, content)
        .map_err(|e| Error::State(format!("failed to write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, &path)
        .map_err(|e| Error::State(format!("failed to replace {}: {e}", path.display())))?;

    Ok(())
}
