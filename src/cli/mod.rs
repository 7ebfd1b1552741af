//! CLI module - Command-line interface for catchup
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// catchup - which of this season's shows are you behind on?
#[derive(Parser)]
#[command(name = "catchup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile the watch-list with this season's schedule, grouped by weekday
    #[command(alias = "b")]
    Board {
        /// Print the weekday mapping as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write episode progress back to the list
    #[command(alias = "u")]
    Update {
        /// Series ID
        id: i32,
        /// Absolute number of watched episodes
        #[arg(conflicts_with_all = ["next", "prev"])]
        episodes: Option<i32>,
        /// Mark one more episode as watched
        #[arg(long, conflicts_with = "prev")]
        next: bool,
        /// Unmark the last watched episode
        #[arg(long)]
        prev: bool,
        /// Score to record (defaults to the current one)
        #[arg(long)]
        score: Option<i32>,
        /// Total episode count, marks the entry completed when reached
        #[arg(long)]
        total: Option<i32>,
    },

    /// Refresh the stored access token now
    RefreshToken,

    /// Create default config file
    Init,
}

pub use commands::*;
