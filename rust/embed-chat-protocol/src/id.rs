use std::fmt::Display;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::time::now;

/// Identifies one embedding session.
///
/// The Host puts it in every `identify-parent` ping and the Guest must echo
/// it in its `initialize` announcement. Matching it is the only thing that
/// distinguishes this session's Guest from any other frame posting to the
/// same window, so it must be unique per session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Generate a fresh identifier: a ULID stamped with the current time
    /// and 80 random bits.
    pub fn generate() -> Self {
        Self(Ulid::from_datetime(now()).to_string())
    }

    /// The identifier as it appears on the wire
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ChannelId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Correlates a `command` with its `acknowledge` and `result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(u64);

impl CommandId {
    /// Wrap a raw id, e.g. one received from the Guest
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw numeric value
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic source of [`CommandId`]s for commands the Host issues.
///
/// Ids are unique for the lifetime of the generator no matter how quickly
/// they are requested.
#[derive(Debug)]
pub struct CommandIds {
    next: u64,
}

impl Default for CommandIds {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl CommandIds {
    /// Take the next unused id
    pub fn next_id(&mut self) -> CommandId {
        let id = CommandId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn it_generates_distinct_channel_ids() {
        let ids: HashSet<ChannelId> = (0..256).map(|_| ChannelId::generate()).collect();
        assert_eq!(ids.len(), 256);
    }

    #[test]
    fn it_issues_unique_command_ids_under_rapid_calls() {
        let mut ids = CommandIds::default();
        let issued: HashSet<CommandId> = (0..10_000).map(|_| ids.next_id()).collect();
        assert_eq!(issued.len(), 10_000);
    }

    #[test]
    fn it_serializes_command_ids_as_plain_numbers() {
        let json = serde_json::to_string(&CommandId::new(42)).unwrap();
        assert_eq!(json, "42");
    }
}
