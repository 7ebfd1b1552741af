pub const USER_AGENT: &str = concat!("catchup/", env!("CARGO_PKG_VERSION"));

pub mod mal {

    /// Catalog fields needed for weekday, episode count and cover.
    pub const CATALOG_FIELDS: &str = "broadcast,num_episodes,status,main_picture";

    pub const WATCH_LIST_FIELDS: &str = "list_status";

    pub const WATCHING: &str = "watching";

    pub const COMPLETED: &str = "completed";
}

pub mod intervals {
    use std::time::Duration;

    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Broadcast times are announced in Japan Standard Time.
pub const JST_OFFSET_SECONDS: i32 = 9 * 3600;
