use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::auth::AppState;

/// Background task that prunes abandoned uploads.
///
/// Runs on an interval, finds media still `temporary` after the retention
/// period, deletes their files from disk and drops their rows. A row whose
/// file could not be removed is kept for the next sweep.
pub async fn run_cleanup_loop(state: AppState, retention: chrono::Duration, interval: Duration) {
    let mut interval = tokio::time::interval(interval);

    loop {
        interval.tick().await;

        match cleanup_expired(&state, retention).await {
            Ok(count) => {
                if count > 0 {
                    info!("Cleanup: pruned {} abandoned uploads", count);
                }
            }
            Err(e) => {
                warn!("Cleanup error: {}", e);
            }
        }
    }
}

pub async fn cleanup_expired(state: &AppState, retention: chrono::Duration) -> anyhow::Result<usize> {
    let cutoff = Utc::now() - retention;
    let expired = state.with_db(move |db| db.expired_media(cutoff)).await?;

    let mut count = 0;
    for media in expired {
        // Keep the row while the file is still on disk so a later sweep retries.
        if let Err(e) = state.storage.delete(&media.file_name).await {
            warn!("Cleanup: could not delete {}: {:#}", media.file_name, e);
            continue;
        }

        let id = media.id.clone();
        state.with_db(move |db| db.delete_media(&id)).await?;
        count += 1;
    }

    Ok(count)
}
