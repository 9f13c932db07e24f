use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// True for `.jpg` / `.jpeg` files, case-insensitively.
pub fn is_photo(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

/// Photos directly inside `folder`, sorted by file name.
pub async fn find_photos(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(folder)
        .await
        .with_context(|| format!("Failed to read photo folder {}", folder.display()))?;

    let mut photos = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("Failed to list {}", folder.display()))?
    {
        let path = entry.path();
        if is_photo(&path) && entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            photos.push(path);
        }
    }

    photos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(photos)
}
