//! Persistence: a small explicit repository interface per entity collection,
//! implemented once for the JSON-file backend.

mod json;

pub use json::JsonStore;

use std::collections::HashMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{Assignment, Level, Session, Skill, User};

pub type StoreResult<T> = Result<T, StoreError>;

/// Fields accepted when creating or replacing a level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDraft {
    pub name: String,
    /// 0 means "derive from the name" via the legacy shim.
    #[serde(default)]
    pub ordinal: u32,
    pub experience_needed: u64,
    pub new_skill_count: u32,
}

/// Fields accepted when creating or replacing a skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDraft {
    pub name: String,
    pub experience_needed: u64,
    #[serde(default)]
    pub emoji: String,
}

/// One submitted skill-tree placement; ids reference existing records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub level_id: String,
    pub skill_id: String,
    pub position: u32,
}

/// The collaborator contract the progression calculator and handlers consume.
/// One implementation exists (`JsonStore`); tests may provide their own.
pub trait Store: Send + Sync {
    // ── Users ───────────────────────────────────────────────────────────
    fn get_user(&self, username: &str) -> StoreResult<Option<User>>;
    fn get_user_by_id(&self, id: &str) -> StoreResult<Option<User>>;
    fn create_user(&self, username: &str) -> StoreResult<User>;
    /// Overwrite a user's experience and cached level. The caller recomputes
    /// the level from experience; the store never does.
    fn set_user_experience(&self, username: &str, experience: u64, level: u32)
    -> StoreResult<User>;

    // ── Levels ──────────────────────────────────────────────────────────
    /// All levels, sorted ascending by effective ordinal.
    fn all_levels(&self) -> StoreResult<Vec<Level>>;
    fn create_level(&self, draft: LevelDraft) -> StoreResult<Level>;
    fn update_level(&self, id: &str, draft: LevelDraft) -> StoreResult<Level>;
    /// Cascade: assignments referencing the level are removed with it.
    fn delete_level(&self, id: &str) -> StoreResult<()>;

    // ── Skills ──────────────────────────────────────────────────────────
    fn all_skills(&self) -> StoreResult<Vec<Skill>>;
    fn create_skill(&self, draft: SkillDraft) -> StoreResult<Skill>;
    fn update_skill(&self, id: &str, draft: SkillDraft) -> StoreResult<Skill>;
    /// Cascade: assignments referencing the skill are removed with it.
    fn delete_skill(&self, id: &str) -> StoreResult<()>;

    // ── Assignments ─────────────────────────────────────────────────────
    /// A user's placements, sorted by level ordinal then position.
    fn assignments_for_user(&self, user_id: &str) -> StoreResult<Vec<Assignment>>;
    /// Wholesale replace: delete-all-for-user, then insert the submitted
    /// list. Reading back afterwards returns exactly the submitted set.
    fn replace_assignments_for_user(
        &self,
        user_id: &str,
        placements: &[Placement],
    ) -> StoreResult<Vec<Assignment>>;

    // ── Sessions ────────────────────────────────────────────────────────
    fn create_session(&self, user_id: &str, ttl: Duration) -> StoreResult<Session>;
    /// `None` for unknown or expired tokens; expired records are pruned.
    fn get_session(&self, token: &str) -> StoreResult<Option<Session>>;
    fn delete_session(&self, token: &str) -> StoreResult<bool>;

    // ── Maintenance ─────────────────────────────────────────────────────
    /// Reset every collection to empty.
    fn reset(&self) -> StoreResult<()>;
}

/// Validate a skill-tree submission against the editor contract: known ids,
/// each skill placed at most once, per-level capacity respected, positions
/// densely 0..n−1 within each level. Violations reject the whole submission
/// with no state change.
pub fn validate_placements(
    levels: &[Level],
    skills: &[Skill],
    placements: &[Placement],
) -> StoreResult<()> {
    let level_capacity: HashMap<&str, u32> = levels
        .iter()
        .map(|level| (level.id.as_str(), level.new_skill_count))
        .collect();
    let known_skills: std::collections::HashSet<&str> =
        skills.iter().map(|skill| skill.id.as_str()).collect();

    let mut seen_skills = std::collections::HashSet::new();
    let mut positions_by_level: HashMap<&str, Vec<u32>> = HashMap::new();

    for placement in placements {
        if !level_capacity.contains_key(placement.level_id.as_str()) {
            return Err(StoreError::constraint(format!(
                "unknown level id {}",
                placement.level_id
            )));
        }
        if !known_skills.contains(placement.skill_id.as_str()) {
            return Err(StoreError::constraint(format!(
                "unknown skill id {}",
                placement.skill_id
            )));
        }
        if !seen_skills.insert(placement.skill_id.as_str()) {
            return Err(StoreError::constraint(format!(
                "skill {} placed more than once",
                placement.skill_id
            )));
        }
        positions_by_level
            .entry(placement.level_id.as_str())
            .or_default()
            .push(placement.position);
    }

    for (level_id, mut positions) in positions_by_level {
        let capacity = level_capacity[level_id];
        if positions.len() > capacity as usize {
            return Err(StoreError::constraint(format!(
                "level {level_id} holds {} skills but its capacity is {capacity}",
                positions.len()
            )));
        }
        positions.sort_unstable();
        for (expected, actual) in positions.iter().enumerate() {
            if *actual as usize != expected {
                return Err(StoreError::constraint(format!(
                    "positions in level {level_id} must be dense from 0"
                )));
            }
        }
    }

    Ok(())
}
