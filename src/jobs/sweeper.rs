use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

/// Periodic reclamation of retained output artifacts. Deletes only files
/// already past the retention window, so it is safe to run concurrently
/// with artifact creation and with itself.
pub struct RetentionSweeper {
    dir: PathBuf,
    retention: Duration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(dir: PathBuf, retention: Duration, interval: Duration) -> Self {
        Self {
            dir,
            retention,
            interval,
        }
    }

    pub async fn run(self) {
        loop {
            sleep(self.interval).await;
            match self.sweep() {
                Ok(0) => {}
                Ok(n) => info!("Swept {} expired artifacts", n),
                Err(e) => error!("Artifact sweep failed: {}", e),
            }
        }
    }

    /// One pass over the output directory. Returns how many files went.
    pub fn sweep(&self) -> std::io::Result<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let expired = meta
                .modified()
                .ok()
                .and_then(|m| m.elapsed().ok())
                .map(|age| age >= self.retention)
                .unwrap_or(false);
            if expired {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    // a concurrent sweep or manual delete got there first
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(removed)
    }
}
