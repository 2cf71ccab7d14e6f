use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use tokio::fs;

/// Creates `path` with any missing parents; an existing directory is kept as is.
pub async fn ensure_directory_exists(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if fs::try_exists(path).await.unwrap_or(false) {
        return Ok(());
    }
    fs::create_dir_all(path)
        .await
        .with_context(|| format!("Failed to create directory {}", path.display()))?;
    debug!("Created directory {}", path.display());
    Ok(())
}

/// Human-readable duration, e.g. `1h 02m 03s`.
pub fn format_uptime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(5), "5s");
        assert_eq!(format_uptime(65), "1m 05s");
        assert_eq!(format_uptime(3723), "1h 02m 03s");
    }
}
