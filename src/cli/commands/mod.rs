mod board;
mod refresh;
mod update;

pub use board::{cmd_board, render_board};
pub use refresh::cmd_refresh_token;
pub use update::{EpisodeChange, UpdateRequest, cmd_update};
