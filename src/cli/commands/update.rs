//! Progress write-back command handler

use crate::clients::mal::ListStatusUpdate;
use crate::config::Config;
use crate::domain::SeriesId;
use crate::models::series::{EpisodeTotal, WatchListEntry};
use crate::services::SeasonTracker;
use anyhow::Context;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeChange {
    Set(i32),
    Next,
    Prev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateRequest {
    pub id: SeriesId,
    pub change: EpisodeChange,
    pub score: Option<i32>,
    pub total: Option<i32>,
}

impl UpdateRequest {
    /// Whether the current list entry is needed to build the update.
    #[must_use]
    pub fn needs_current(&self) -> bool {
        self.score.is_none() || !matches!(self.change, EpisodeChange::Set(_))
    }

    /// Builds the update; an explicit `--total` wins over the reconciled one.
    pub fn resolve(
        &self,
        current: Option<&WatchListEntry>,
        reconciled: EpisodeTotal,
    ) -> anyhow::Result<ListStatusUpdate> {
        let total = self
            .total
            .map_or(reconciled, |n| EpisodeTotal::first_positive(&[Some(n)]));
        let score = self.score.or(current.map(|c| c.user_score)).unwrap_or(0);

        let base = |current: Option<&WatchListEntry>| {
            current
                .map(|c| ListStatusUpdate::new(self.id, c.episodes_watched, score, total))
                .with_context(|| format!("Series {} is not on the watching list", self.id))
        };

        Ok(match self.change {
            EpisodeChange::Set(n) => ListStatusUpdate::new(self.id, n, score, total),
            EpisodeChange::Next => base(current)?.step_forward(),
            EpisodeChange::Prev => base(current)?.step_back(),
        })
    }
}

pub async fn cmd_update(config: &Config, request: UpdateRequest) -> anyhow::Result<()> {
    let tracker = SeasonTracker::from_config(config)?;

    let current = if request.needs_current() {
        tracker
            .mal()
            .fetch_watching(tracker.username())
            .await
            .context("Failed to fetch watch-list")?
            .into_iter()
            .find(|e| e.series_id == request.id)
    } else {
        None
    };

    let reconciled = if request.total.is_none() {
        reconciled_total(&tracker, request.id).await
    } else {
        EpisodeTotal::Unknown
    };

    let update = request.resolve(current.as_ref(), reconciled)?;
    let recorded = tracker
        .mal()
        .update_list_status(&update)
        .await
        .context("Failed to update list status")?;

    let progress = update.total.known().map_or_else(
        || recorded.episodes_watched.to_string(),
        |total| format!("{}/{total}", recorded.episodes_watched),
    );
    println!(
        "✓ Series {}: {} episodes watched ({}), score {}",
        recorded.series_id,
        progress,
        update.list_status(),
        recorded.user_score
    );

    Ok(())
}

/// Episode total from this season's reconciliation; unknown if the pass fails
/// or the series is not on this season's board.
async fn reconciled_total(tracker: &SeasonTracker, id: SeriesId) -> EpisodeTotal {
    let today = chrono::Local::now().date_naive();
    match tracker.run_pass_for(today).await {
        Ok(board) => board
            .find(id)
            .map_or(EpisodeTotal::Unknown, |series| series.total_episodes),
        Err(e) => {
            warn!(error = %e, series = %id, "Could not reconcile episode total");
            EpisodeTotal::Unknown
        }
    }
}
