//! Weekday board command handler

use crate::config::Config;
use crate::constants::JST_OFFSET_SECONDS;
use crate::models::series::{ReconciledSeries, WeekdayBoard};
use crate::services::SeasonTracker;
use anyhow::Context;
use chrono::FixedOffset;
use std::fmt::Write;

pub async fn cmd_board(config: &Config, json: bool) -> anyhow::Result<()> {
    let tracker = SeasonTracker::from_config(config)?;
    let today = chrono::Local::now().date_naive();

    let board = tracker
        .run_pass_for(today)
        .await
        .context("Reconciliation pass failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&board)?);
    } else {
        print!("{}", render_board(&board));
    }

    Ok(())
}

fn render_series(series: &ReconciledSeries) -> String {
    let next = match series.next_airing_in_hours {
        Some(hours) => format!("Next in {hours}h"),
        None => "No upcoming episode".to_string(),
    };

    let mut line = format!(
        "  {} - {}/{} eps - {} - Status: {}",
        series.title, series.episodes_watched, series.total_episodes, next, series.status
    );

    if let (Some(at), Some(jst)) = (
        series.next_airing_at,
        FixedOffset::east_opt(JST_OFFSET_SECONDS),
    ) {
        let _ = write!(line, " ({} JST)", at.with_timezone(&jst).format("%a %H:%M"));
    }

    line
}

/// Plain-text board, one section per weekday starting on Sunday.
#[must_use]
pub fn render_board(board: &WeekdayBoard) -> String {
    let mut out = String::new();

    for (i, (weekday, series)) in board.iter().enumerate() {
        let _ = writeln!(out, "Day {i} ({weekday}):");
        for s in series {
            let _ = writeln!(out, "{}", render_series(s));
        }
    }

    out
}
