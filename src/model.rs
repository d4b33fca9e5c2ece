//! Canonical entity schema, shared by the store, the progression calculator,
//! and the HTTP surface. Wire names are camelCase to stay compatible with the
//! JSON collections on disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    /// Cached mirror of the last computed level. `experience` is the source
    /// of truth; this is recomputed on every experience write, never set by
    /// clients.
    pub level: u32,
    pub experience: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub id: String,
    pub name: String,
    /// Progression position, 1-based. Records persisted before this field
    /// existed carry 0 here and fall back to the trailing integer in `name`.
    #[serde(default)]
    pub ordinal: u32,
    /// Incremental cost to advance from the previous level, not cumulative.
    pub experience_needed: u64,
    /// Capacity: how many skills may be assigned to this level per user.
    pub new_skill_count: u32,
}

impl Level {
    /// The ordinal used for progression ordering, applying the legacy
    /// name-parsing shim when the explicit field is absent. Yields 0 for
    /// non-conforming names; such levels are excluded from the progression
    /// catalog.
    pub fn effective_ordinal(&self) -> u32 {
        if self.ordinal > 0 {
            self.ordinal
        } else {
            ordinal_from_name(&self.name)
        }
    }
}

/// Migration shim: parse the trailing integer of a legacy "Level N" name.
/// Returns 0 when no trailing integer is present.
pub fn ordinal_from_name(name: &str) -> u32 {
    name.trim()
        .rsplit(' ')
        .next()
        .and_then(|tail| tail.parse().ok())
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: String,
    pub name: String,
    /// Incremental cost, within the level this skill is assigned to, for the
    /// skill to unlock.
    pub experience_needed: u64,
    #[serde(default)]
    pub emoji: String,
}

/// A per-user placement of a skill into a level at a given position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub user_id: String,
    pub level_id: String,
    pub skill_id: String,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
