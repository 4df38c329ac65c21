use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Downloads a remote input into `dest_dir`, named after the last URL
/// segment. An empty body is treated as an unusable input, not a success.
pub async fn download(url: &str, dest_dir: &Path) -> Result<PathBuf> {
    info!("Starting download from URL: {}", url);

    let dest_path = dest_dir.join(filename_for(url));

    let response = reqwest::get(url)
        .await
        .map_err(|e| anyhow::anyhow!("HTTP request failed: {}", e))?;

    if !response.status().is_success() {
        return Err(anyhow::anyhow!(
            "HTTP request failed with status: {}",
            response.status()
        ));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read response: {}", e))?;

    if bytes.is_empty() {
        return Err(anyhow::anyhow!("Remote source is empty: {}", url));
    }

    fs::write(&dest_path, bytes)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to write file: {}", e))?;

    info!("Download completed: {:?}", dest_path);
    Ok(dest_path)
}

// Last path segment with query stripped, restricted to a safe charset.
fn filename_for(url: &str) -> String {
    let name = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .rsplit('/')
        .next()
        .unwrap_or("");
    let name: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if name.is_empty() {
        "input.bin".to_string()
    } else {
        name
    }
}
