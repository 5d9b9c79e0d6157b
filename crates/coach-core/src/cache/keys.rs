//! Cache key builders.
//!
//! Keys follow `<entity>:<scope>:<id>`. Pending-job markers live in the same
//! store under `job:<kind>:<session_id>` (see [`crate::jobs`]).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Session(String),
    SessionList(String),
    Evaluation(String),
    DueItems(String),
}

impl CacheKey {
    pub fn session(session_id: &str) -> Self {
        CacheKey::Session(session_id.to_string())
    }

    pub fn session_list(user_id: &str) -> Self {
        CacheKey::SessionList(user_id.to_string())
    }

    pub fn evaluation(session_id: &str) -> Self {
        CacheKey::Evaluation(session_id.to_string())
    }

    pub fn due_items(user_id: &str) -> Self {
        CacheKey::DueItems(user_id.to_string())
    }

    /// Prefix shared by every due-items key.
    pub const DUE_ITEMS_PREFIX: &'static str = "review:due:";

    pub fn render(&self) -> String {
        match self {
            CacheKey::Session(id) => format!("session:id:{}", id),
            CacheKey::SessionList(user) => format!("sessions:user:{}", user),
            CacheKey::Evaluation(id) => format!("evaluation:session:{}", id),
            CacheKey::DueItems(user) => format!("{}{}", Self::DUE_ITEMS_PREFIX, user),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
