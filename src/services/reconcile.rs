//! Reconciliation of the user's watch-list against the seasonal catalog and
//! the live airing schedule.
//!
//! The catalog counts episodes cumulatively across the parts of a series
//! while the airing oracle numbers only the part currently on air. When both
//! report a positive episode count their difference is the offset between the
//! two numbering schemes, and it is added to the oracle's next episode number
//! so that it can be compared with the watched count.

use crate::clients::AiringOracle;
use crate::domain::{SeriesId, Weekday};
use crate::error::OracleError;
use crate::models::series::{
    AiringInfo, EpisodeTotal, NextAiring, ReconciledSeries, SeriesCatalogEntry, WatchListEntry,
    WatchStatus, WeekdayBoard,
};
use chrono::DateTime;
use futures::{StreamExt, stream};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Episode numbering for one series after merging both sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeResolution {
    pub total: EpisodeTotal,
    /// Difference between catalog and oracle numbering, when both counts are
    /// known.
    pub offset: Option<i32>,
    /// Oracle's next airing with the episode number shifted by `offset`.
    pub next_airing: Option<NextAiring>,
}

pub fn resolve_episodes(
    declared: Option<i32>,
    lookup: &Result<AiringInfo, OracleError>,
) -> EpisodeResolution {
    let Ok(info) = lookup else {
        return EpisodeResolution {
            total: EpisodeTotal::first_positive(&[declared]),
            offset: None,
            next_airing: None,
        };
    };

    let authoritative = info.authoritative_episode_count;
    match (
        declared.filter(|n| *n > 0),
        authoritative.filter(|n| *n > 0),
    ) {
        (Some(declared), Some(authoritative)) => {
            let offset = declared - authoritative;
            EpisodeResolution {
                total: EpisodeTotal::Known(declared),
                offset: Some(offset),
                next_airing: info.next_airing.map(|next| NextAiring {
                    episode: next.episode.saturating_add(offset),
                    ..next
                }),
            }
        }
        // Counts disagree in an unknown way or one is missing: take the first
        // one available and leave the oracle's numbering as is.
        _ => EpisodeResolution {
            total: EpisodeTotal::first_positive(&[authoritative, declared]),
            offset: None,
            next_airing: info.next_airing,
        },
    }
}

/// Whole hours until the next episode, rounded down.
#[must_use]
pub const fn hours_until(seconds: i64) -> i64 {
    seconds.div_euclid(3600)
}

/// Classifies progress against what has aired so far.
///
/// With a scheduled next episode everything before it has aired. Without
/// one, the series counts as caught up only once the known total is watched.
#[must_use]
pub fn derive_status(
    episodes_watched: i32,
    total: EpisodeTotal,
    next_episode: Option<i32>,
) -> WatchStatus {
    let caught_up = match next_episode {
        Some(next) => episodes_watched >= next.saturating_sub(1),
        None => matches!(total, EpisodeTotal::Known(n) if n > 0 && episodes_watched >= n),
    };

    if caught_up {
        WatchStatus::CaughtUp
    } else {
        WatchStatus::Behind
    }
}

/// Builds the output record for one matched series.
pub fn reconcile_entry(
    entry: &SeriesCatalogEntry,
    watched: &WatchListEntry,
    weekday: Weekday,
    lookup: &Result<AiringInfo, OracleError>,
) -> ReconciledSeries {
    let resolution = resolve_episodes(entry.declared_episode_count, lookup);
    let next = resolution.next_airing;

    ReconciledSeries {
        title: entry.title.clone(),
        series_id: entry.id,
        episodes_watched: watched.episodes_watched,
        total_episodes: resolution.total,
        next_episode: next.map(|n| n.episode),
        next_airing_at: next.and_then(|n| DateTime::from_timestamp(n.airing_at, 0)),
        next_airing_in_hours: next.map(|n| hours_until(n.seconds_until_airing)),
        status: derive_status(
            watched.episodes_watched,
            resolution.total,
            next.map(|n| n.episode),
        ),
        cover_image_url: entry.cover_image_url.clone(),
        weekday,
        user_score: watched.user_score,
    }
}

#[derive(Clone)]
pub struct ReconciliationEngine {
    oracle: Arc<dyn AiringOracle>,
    concurrency: usize,
}

impl ReconciliationEngine {
    pub fn new(oracle: Arc<dyn AiringOracle>, concurrency: usize) -> Self {
        Self {
            oracle,
            concurrency: concurrency.max(1),
        }
    }

    /// Joins the watch-list with the catalog and buckets the result by
    /// broadcast weekday.
    ///
    /// Airing lookups run concurrently but results are merged in watch-list
    /// order. A failed lookup degrades only its own entry.
    pub async fn reconcile(
        &self,
        catalog: &[SeriesCatalogEntry],
        watch_list: &[WatchListEntry],
    ) -> WeekdayBoard {
        let index: HashMap<SeriesId, &SeriesCatalogEntry> =
            catalog.iter().map(|entry| (entry.id, entry)).collect();

        let matched: Vec<(&SeriesCatalogEntry, &WatchListEntry, Weekday)> = watch_list
            .iter()
            .filter_map(|watched| {
                let entry = *index.get(&watched.series_id)?;
                let Some(weekday) = entry.broadcast_weekday else {
                    debug!(series_id = %entry.id, title = %entry.title, "No broadcast weekday, skipping");
                    return None;
                };
                Some((entry, watched, weekday))
            })
            .collect();

        let oracle = self.oracle.as_ref();
        let reconciled: Vec<ReconciledSeries> = stream::iter(matched)
            .map(|(entry, watched, weekday)| async move {
                let lookup = oracle.query_by_external_id(entry.id).await;
                if let Err(e) = &lookup {
                    warn!(series_id = %entry.id, error = %e, "Airing lookup failed, using catalog data");
                }
                reconcile_entry(entry, watched, weekday, &lookup)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut board = WeekdayBoard::new();
        for series in reconciled {
            board.push(series);
        }

        info!(
            watching = watch_list.len(),
            reconciled = board.len(),
            "Reconciliation pass complete"
        );
        board
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeOracle {
        answers: HashMap<SeriesId, Result<AiringInfo, OracleError>>,
        calls: AtomicUsize,
    }

    impl FakeOracle {
        fn with(mut self, id: i32, answer: Result<AiringInfo, OracleError>) -> Self {
            self.answers.insert(SeriesId::new(id), answer);
            self
        }
    }

    #[async_trait]
    impl AiringOracle for FakeOracle {
        async fn query_by_external_id(&self, id: SeriesId) -> Result<AiringInfo, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .get(&id)
                .cloned()
                .unwrap_or(Err(OracleError::NotFound(id)))
        }
    }

    fn airing(episodes: Option<i32>, next: Option<(i32, i64)>) -> AiringInfo {
        AiringInfo {
            authoritative_episode_count: episodes,
            next_airing: next.map(|(episode, seconds)| NextAiring {
                episode,
                airing_at: 1_760_000_000,
                seconds_until_airing: seconds,
            }),
        }
    }

    fn catalog_entry(id: i32, weekday: Option<Weekday>, declared: Option<i32>) -> SeriesCatalogEntry {
        SeriesCatalogEntry {
            id: SeriesId::new(id),
            title: format!("Series {id}"),
            broadcast_weekday: weekday,
            declared_episode_count: declared,
            cover_image_url: None,
        }
    }

    fn watching(id: i32, episodes: i32) -> WatchListEntry {
        WatchListEntry {
            series_id: SeriesId::new(id),
            episodes_watched: episodes,
            user_score: 0,
        }
    }

    #[test]
    fn offset_corrects_next_episode() {
        let lookup = Ok(airing(Some(12), Some((5, 3600))));
        let resolution = resolve_episodes(Some(24), &lookup);

        assert_eq!(resolution.offset, Some(12));
        assert_eq!(resolution.total, EpisodeTotal::Known(24));
        assert_eq!(resolution.next_airing.unwrap().episode, 17);

        assert_eq!(
            derive_status(16, resolution.total, Some(17)),
            WatchStatus::CaughtUp
        );
        assert_eq!(
            derive_status(15, resolution.total, Some(17)),
            WatchStatus::Behind
        );
    }

    #[test]
    fn matching_counts_give_zero_offset() {
        let lookup = Ok(airing(Some(12), Some((5, 0))));
        let resolution = resolve_episodes(Some(12), &lookup);

        assert_eq!(resolution.offset, Some(0));
        assert_eq!(resolution.next_airing.unwrap().episode, 5);
    }

    #[test]
    fn fallback_prefers_oracle_count() {
        let lookup = Ok(airing(Some(13), Some((3, 0))));
        let resolution = resolve_episodes(Some(0), &lookup);

        assert_eq!(resolution.offset, None);
        assert_eq!(resolution.total, EpisodeTotal::Known(13));
        assert_eq!(resolution.next_airing.unwrap().episode, 3);
    }

    #[test]
    fn fallback_uses_declared_when_oracle_count_missing() {
        let lookup = Ok(airing(None, Some((8, 0))));
        let resolution = resolve_episodes(Some(25), &lookup);

        assert_eq!(resolution.total, EpisodeTotal::Known(25));
        assert_eq!(resolution.next_airing.unwrap().episode, 8);
    }

    #[test]
    fn fallback_unknown_when_no_count() {
        let lookup = Ok(airing(None, None));
        let resolution = resolve_episodes(None, &lookup);
        assert_eq!(resolution.total, EpisodeTotal::Unknown);
    }

    #[test]
    fn smaller_declared_count_is_accepted_as_is() {
        // Catalog behind the oracle still yields an offset, just a negative one.
        let lookup = Ok(airing(Some(24), Some((10, 0))));
        let resolution = resolve_episodes(Some(12), &lookup);

        assert_eq!(resolution.offset, Some(-12));
        assert_eq!(resolution.total, EpisodeTotal::Known(12));
        assert_eq!(resolution.next_airing.unwrap().episode, -2);
    }

    #[test]
    fn oracle_failure_falls_back_to_declared() {
        let lookup = Err(OracleError::Transport("timeout".to_string()));
        let resolution = resolve_episodes(Some(12), &lookup);
        assert_eq!(resolution.total, EpisodeTotal::Known(12));
        assert!(resolution.next_airing.is_none());

        let resolution = resolve_episodes(Some(0), &lookup);
        assert_eq!(resolution.total, EpisodeTotal::Unknown);
    }

    #[test]
    fn status_without_schedule() {
        assert_eq!(
            derive_status(12, EpisodeTotal::Known(12), None),
            WatchStatus::CaughtUp
        );
        assert_eq!(
            derive_status(11, EpisodeTotal::Known(12), None),
            WatchStatus::Behind
        );
        assert_eq!(
            derive_status(5, EpisodeTotal::Unknown, None),
            WatchStatus::Behind
        );
        assert_eq!(
            derive_status(0, EpisodeTotal::Known(0), None),
            WatchStatus::Behind
        );
    }

    #[test]
    fn status_boundary_with_schedule() {
        // Episode 8 is next, so 7 have aired.
        assert_eq!(
            derive_status(7, EpisodeTotal::Unknown, Some(8)),
            WatchStatus::CaughtUp
        );
        assert_eq!(
            derive_status(6, EpisodeTotal::Unknown, Some(8)),
            WatchStatus::Behind
        );
        assert_eq!(
            derive_status(0, EpisodeTotal::Known(12), Some(1)),
            WatchStatus::CaughtUp
        );
    }

    #[test]
    fn countdown_rounds_down_to_hours() {
        assert_eq!(hours_until(90000), 25);
        assert_eq!(hours_until(3599), 0);
        assert_eq!(hours_until(3600), 1);
    }

    #[test]
    fn reconcile_entry_fills_schedule_fields() {
        let entry = catalog_entry(1, Some(Weekday::Friday), Some(24));
        let lookup = Ok(airing(Some(12), Some((5, 90000))));
        let series = reconcile_entry(&entry, &watching(1, 16), Weekday::Friday, &lookup);

        assert_eq!(series.total_episodes, EpisodeTotal::Known(24));
        assert_eq!(series.next_episode, Some(17));
        assert_eq!(series.next_airing_in_hours, Some(25));
        assert_eq!(
            series.next_airing_at.map(|t| t.timestamp()),
            Some(1_760_000_000)
        );
        assert_eq!(series.status, WatchStatus::CaughtUp);
    }

    #[tokio::test]
    async fn reconcile_keeps_only_intersection() {
        let catalog = vec![
            catalog_entry(1, Some(Weekday::Monday), Some(12)),
            catalog_entry(2, Some(Weekday::Tuesday), Some(12)),
        ];
        let watch_list = vec![watching(1, 3), watching(3, 3)];
        let oracle = Arc::new(FakeOracle::default().with(1, Ok(airing(Some(12), Some((4, 0))))));

        let engine = ReconciliationEngine::new(oracle.clone(), 4);
        let board = engine.reconcile(&catalog, &watch_list).await;

        assert_eq!(board.len(), 1);
        assert_eq!(board.day(Weekday::Monday)[0].series_id, SeriesId::new(1));
        assert!(board.find(SeriesId::new(2)).is_none());
        assert!(board.find(SeriesId::new(3)).is_none());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reconcile_drops_missing_weekday_without_lookup() {
        let catalog = vec![
            catalog_entry(1, None, Some(12)),
            catalog_entry(2, Some(Weekday::Sunday), Some(12)),
        ];
        let watch_list = vec![watching(1, 0), watching(2, 0)];
        let oracle = Arc::new(FakeOracle::default().with(2, Ok(airing(Some(12), None))));

        let engine = ReconciliationEngine::new(oracle.clone(), 2);
        let board = engine.reconcile(&catalog, &watch_list).await;

        assert_eq!(board.len(), 1);
        assert_eq!(board.day(Weekday::Sunday).len(), 1);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn oracle_failure_is_isolated() {
        let catalog = vec![
            catalog_entry(1, Some(Weekday::Wednesday), Some(12)),
            catalog_entry(2, Some(Weekday::Wednesday), Some(24)),
            catalog_entry(3, Some(Weekday::Wednesday), None),
        ];
        let watch_list = vec![watching(1, 12), watching(2, 16), watching(3, 1)];
        let oracle = FakeOracle::default()
            .with(1, Err(OracleError::Transport("reset".to_string())))
            .with(2, Ok(airing(Some(12), Some((5, 0)))))
            .with(3, Err(OracleError::Malformed("bad json".to_string())));

        let engine = ReconciliationEngine::new(Arc::new(oracle), 3);
        let board = engine.reconcile(&catalog, &watch_list).await;

        let wednesday = board.day(Weekday::Wednesday);
        assert_eq!(wednesday.len(), 3);

        assert_eq!(wednesday[0].total_episodes, EpisodeTotal::Known(12));
        assert_eq!(wednesday[0].next_airing_in_hours, None);
        assert_eq!(wednesday[0].status, WatchStatus::CaughtUp);

        assert_eq!(wednesday[1].next_episode, Some(17));
        assert_eq!(wednesday[1].status, WatchStatus::CaughtUp);

        assert_eq!(wednesday[2].total_episodes, EpisodeTotal::Unknown);
        assert_eq!(wednesday[2].status, WatchStatus::Behind);
    }

    #[tokio::test]
    async fn bucket_order_follows_watch_list() {
        let catalog = vec![
            catalog_entry(10, Some(Weekday::Saturday), None),
            catalog_entry(20, Some(Weekday::Saturday), None),
            catalog_entry(30, Some(Weekday::Saturday), None),
        ];
        let watch_list = vec![watching(30, 0), watching(10, 0), watching(20, 0)];
        let oracle = FakeOracle::default()
            .with(10, Ok(airing(None, None)))
            .with(20, Ok(airing(None, None)))
            .with(30, Ok(airing(None, None)));

        let engine = ReconciliationEngine::new(Arc::new(oracle), 8);
        let board = engine.reconcile(&catalog, &watch_list).await;

        let ids: Vec<i32> = board
            .day(Weekday::Saturday)
            .iter()
            .map(|s| s.series_id.value())
            .collect();
        assert_eq!(ids, vec![30, 10, 20]);
    }

    #[test]
    fn extreme_episode_numbers_saturate() {
        let lookup = Ok(airing(Some(1), Some((i32::MAX, 3600))));
        let resolution = resolve_episodes(Some(24), &lookup);
        assert_eq!(resolution.next_airing.map(|n| n.episode), Some(i32::MAX));

        assert_eq!(
            derive_status(0, EpisodeTotal::Unknown, Some(i32::MIN)),
            WatchStatus::CaughtUp
        );
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let catalog = vec![
            catalog_entry(1, Some(Weekday::Thursday), Some(24)),
            catalog_entry(2, Some(Weekday::Friday), None),
        ];
        let watch_list = vec![watching(1, 10), watching(2, 2)];
        let oracle = FakeOracle::default()
            .with(1, Ok(airing(Some(12), Some((5, 7200)))))
            .with(2, Err(OracleError::NotFound(SeriesId::new(2))));

        let engine = ReconciliationEngine::new(Arc::new(oracle), 2);
        let first = engine.reconcile(&catalog, &watch_list).await;
        let second = engine.reconcile(&catalog, &watch_list).await;

        assert_eq!(first, second);
    }
}
