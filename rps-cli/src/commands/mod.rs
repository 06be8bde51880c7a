mod console;
mod history;
mod play;

pub use history::{list_sessions, replay_session, show_session};
pub use play::{play, PlayArgs};

/// First eight characters of an identifier, for tables.
pub(crate) fn short(id: &str) -> String {
    id.chars().take(8).collect()
}
