//! Helpers for tests that write artifacts next to the workspace.

use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum TestUtilError {
    #[error("Failed to find project root: {0}")]
    ProjectRootNotFound(String),
}

/// Walk up from the current directory to the workspace `Cargo.toml`.
pub fn find_project_root() -> Result<PathBuf, TestUtilError> {
    let mut current_dir = env::current_dir().map_err(|e| {
        TestUtilError::ProjectRootNotFound(format!("Failed to get current directory: {e}"))
    })?;

    loop {
        let cargo_toml = current_dir.join("Cargo.toml");
        if cargo_toml.exists() {
            let content = std::fs::read_to_string(&cargo_toml).map_err(|e| {
                TestUtilError::ProjectRootNotFound(format!("Failed to read Cargo.toml: {e}"))
            })?;

            if content.contains("[workspace]") {
                return Ok(current_dir);
            }
        }

        if !current_dir.pop() {
            break;
        }
    }

    Err(TestUtilError::ProjectRootNotFound(
        "Workspace root not found".to_string(),
    ))
}

static OUTPUT_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    find_project_root()
        .unwrap_or_else(|_| env::temp_dir())
        .join("test_output")
});

/// Directory for test artifacts (frame dumps, telemetry), created on demand.
///
/// Falls back to the system temp directory outside a workspace.
pub fn get_output_dir(subdir: &str) -> std::io::Result<PathBuf> {
    let dir = OUTPUT_ROOT.join(subdir);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
