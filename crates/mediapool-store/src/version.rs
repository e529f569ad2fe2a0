//! Schema version check run before anything else is read.

use tracing::info;

use crate::error::{Result, StoreError};
use crate::layout::Layout;

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

/// Compare `version.json` against [`SCHEMA_VERSION`].
///
/// A root without `version.json` and without any other entry is treated as
/// a fresh store and stamped with the current version. A non-empty root
/// without the file is reported as version 0.
pub async fn check_version(layout: &Layout) -> Result<()> {
    let root = layout.root();
    tokio::fs::create_dir_all(root)
        .await
        .map_err(|e| StoreError::io(root, e))?;

    let path = layout.version_path();
    let found = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text
            .trim()
            .parse::<u32>()
            .map_err(|e| StoreError::corrupt(&path, format!("schema version is not an integer: {}", e)))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if is_empty_dir(root).await? {
                layout
                    .write_atomic(&path, SCHEMA_VERSION.to_string().as_bytes())
                    .await?;
                info!(root = %root.display(), version = SCHEMA_VERSION, "initialized fresh store");
                return Ok(());
            }
            0
        }
        Err(e) => return Err(StoreError::io(&path, e)),
    };

    if found != SCHEMA_VERSION {
        return Err(StoreError::VersionMismatch {
            root: root.to_path_buf(),
            found,
            required: SCHEMA_VERSION,
        });
    }
    Ok(())
}

async fn is_empty_dir(dir: &std::path::Path) -> Result<bool> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))?;
    Ok(entries
        .next_entry()
        .await
        .map_err(|e| StoreError::io(dir, e))?
        .is_none())
}
