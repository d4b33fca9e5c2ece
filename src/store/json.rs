//! Flat-file JSON backend: one array file per collection, whole-file
//! read-modify-write under an in-process lock.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{LevelDraft, Placement, SkillDraft, Store, StoreResult};
use crate::error::StoreError;
use crate::model::{Assignment, Level, Session, Skill, User, ordinal_from_name};

const USERS: &str = "users";
const LEVELS: &str = "levels";
const SKILLS: &str = "skills";
const ASSIGNMENTS: &str = "assignments";
const SESSIONS: &str = "sessions";

const COLLECTIONS: [&str; 5] = [USERS, LEVELS, SKILLS, ASSIGNMENTS, SESSIONS];

pub struct JsonStore {
    data_dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    /// Open (and initialize) a store rooted at `data_dir`. Missing collection
    /// files are seeded empty.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(data_dir)?;
        let store = Self {
            data_dir: data_dir.to_path_buf(),
            lock: Mutex::new(()),
        };
        for name in COLLECTIONS {
            let path = store.collection_path(name);
            if !path.exists() {
                fs::write(&path, "[]\n")?;
            }
        }
        Ok(store)
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.json"))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        // A poisoned lock only means another thread panicked mid-write; the
        // file contents are still a full snapshot.
        self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Read a whole collection. A file that exists but fails to parse is
    /// reset to an empty collection instead of failing permanently.
    fn read_collection<T: DeserializeOwned>(&self, name: &str) -> StoreResult<Vec<T>> {
        let path = self.collection_path(name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path)?;
        match serde_json::from_str(&contents) {
            Ok(items) => Ok(items),
            Err(error) => {
                tracing::warn!("collection {name} is corrupt, resetting to empty: {error}");
                fs::write(&path, "[]\n")?;
                Ok(Vec::new())
            }
        }
    }

    fn write_collection<T: Serialize>(&self, name: &str, items: &[T]) -> StoreResult<()> {
        fs::create_dir_all(&self.data_dir)?;
        let json = serde_json::to_string_pretty(items)?;
        fs::write(self.collection_path(name), json)?;
        Ok(())
    }

    fn ordinal_by_level_id(&self) -> StoreResult<HashMap<String, u32>> {
        let levels: Vec<Level> = self.read_collection(LEVELS)?;
        Ok(levels
            .into_iter()
            .map(|level| {
                let ordinal = level.effective_ordinal();
                (level.id, ordinal)
            })
            .collect())
    }
}

impl Store for JsonStore {
    // ── Users ───────────────────────────────────────────────────────────

    fn get_user(&self, username: &str) -> StoreResult<Option<User>> {
        let _guard = self.lock();
        let users: Vec<User> = self.read_collection(USERS)?;
        Ok(users.into_iter().find(|user| user.username == username))
    }

    fn get_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        let _guard = self.lock();
        let users: Vec<User> = self.read_collection(USERS)?;
        Ok(users.into_iter().find(|user| user.id == id))
    }

    fn create_user(&self, username: &str) -> StoreResult<User> {
        let _guard = self.lock();
        let mut users: Vec<User> = self.read_collection(USERS)?;
        if users.iter().any(|user| user.username == username) {
            return Err(StoreError::constraint(format!(
                "username {username} already exists"
            )));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            level: 0,
            experience: 0,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        self.write_collection(USERS, &users)?;
        Ok(user)
    }

    fn set_user_experience(
        &self,
        username: &str,
        experience: u64,
        level: u32,
    ) -> StoreResult<User> {
        let _guard = self.lock();
        let mut users: Vec<User> = self.read_collection(USERS)?;
        let Some(user) = users.iter_mut().find(|user| user.username == username) else {
            return Err(StoreError::not_found("user", username));
        };
        user.experience = experience;
        user.level = level;
        user.updated_at = Utc::now();
        let updated = user.clone();
        self.write_collection(USERS, &users)?;
        Ok(updated)
    }

    // ── Levels ──────────────────────────────────────────────────────────

    fn all_levels(&self) -> StoreResult<Vec<Level>> {
        let _guard = self.lock();
        let mut levels: Vec<Level> = self.read_collection(LEVELS)?;
        levels.sort_by_key(Level::effective_ordinal);
        Ok(levels)
    }

    fn create_level(&self, draft: LevelDraft) -> StoreResult<Level> {
        let _guard = self.lock();
        let mut levels: Vec<Level> = self.read_collection(LEVELS)?;
        let ordinal = if draft.ordinal > 0 {
            draft.ordinal
        } else {
            ordinal_from_name(&draft.name)
        };
        let level = Level {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            ordinal,
            experience_needed: draft.experience_needed,
            new_skill_count: draft.new_skill_count,
        };
        levels.push(level.clone());
        self.write_collection(LEVELS, &levels)?;
        Ok(level)
    }

    fn update_level(&self, id: &str, draft: LevelDraft) -> StoreResult<Level> {
        let _guard = self.lock();
        let mut levels: Vec<Level> = self.read_collection(LEVELS)?;
        let Some(level) = levels.iter_mut().find(|level| level.id == id) else {
            return Err(StoreError::not_found("level", id));
        };
        level.ordinal = if draft.ordinal > 0 {
            draft.ordinal
        } else {
            ordinal_from_name(&draft.name)
        };
        level.name = draft.name;
        level.experience_needed = draft.experience_needed;
        level.new_skill_count = draft.new_skill_count;
        let updated = level.clone();
        self.write_collection(LEVELS, &levels)?;
        Ok(updated)
    }

    fn delete_level(&self, id: &str) -> StoreResult<()> {
        let _guard = self.lock();
        let mut levels: Vec<Level> = self.read_collection(LEVELS)?;
        let before = levels.len();
        levels.retain(|level| level.id != id);
        if levels.len() == before {
            return Err(StoreError::not_found("level", id));
        }
        self.write_collection(LEVELS, &levels)?;

        let mut assignments: Vec<Assignment> = self.read_collection(ASSIGNMENTS)?;
        assignments.retain(|assignment| assignment.level_id != id);
        self.write_collection(ASSIGNMENTS, &assignments)?;
        Ok(())
    }

    // ── Skills ──────────────────────────────────────────────────────────

    fn all_skills(&self) -> StoreResult<Vec<Skill>> {
        let _guard = self.lock();
        self.read_collection(SKILLS)
    }

    fn create_skill(&self, draft: SkillDraft) -> StoreResult<Skill> {
        let _guard = self.lock();
        let mut skills: Vec<Skill> = self.read_collection(SKILLS)?;
        let skill = Skill {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            experience_needed: draft.experience_needed,
            emoji: draft.emoji,
        };
        skills.push(skill.clone());
        self.write_collection(SKILLS, &skills)?;
        Ok(skill)
    }

    fn update_skill(&self, id: &str, draft: SkillDraft) -> StoreResult<Skill> {
        let _guard = self.lock();
        let mut skills: Vec<Skill> = self.read_collection(SKILLS)?;
        let Some(skill) = skills.iter_mut().find(|skill| skill.id == id) else {
            return Err(StoreError::not_found("skill", id));
        };
        skill.name = draft.name;
        skill.experience_needed = draft.experience_needed;
        skill.emoji = draft.emoji;
        let updated = skill.clone();
        self.write_collection(SKILLS, &skills)?;
        Ok(updated)
    }

    fn delete_skill(&self, id: &str) -> StoreResult<()> {
        let _guard = self.lock();
        let mut skills: Vec<Skill> = self.read_collection(SKILLS)?;
        let before = skills.len();
        skills.retain(|skill| skill.id != id);
        if skills.len() == before {
            return Err(StoreError::not_found("skill", id));
        }
        self.write_collection(SKILLS, &skills)?;

        let mut assignments: Vec<Assignment> = self.read_collection(ASSIGNMENTS)?;
        assignments.retain(|assignment| assignment.skill_id != id);
        self.write_collection(ASSIGNMENTS, &assignments)?;
        Ok(())
    }

    // ── Assignments ─────────────────────────────────────────────────────

    fn assignments_for_user(&self, user_id: &str) -> StoreResult<Vec<Assignment>> {
        let _guard = self.lock();
        let ordinals = self.ordinal_by_level_id()?;
        let assignments: Vec<Assignment> = self.read_collection(ASSIGNMENTS)?;
        let mut mine: Vec<Assignment> = assignments
            .into_iter()
            .filter(|assignment| assignment.user_id == user_id)
            .collect();
        mine.sort_by_key(|assignment| {
            (
                ordinals.get(&assignment.level_id).copied().unwrap_or(0),
                assignment.position,
            )
        });
        Ok(mine)
    }

    fn replace_assignments_for_user(
        &self,
        user_id: &str,
        placements: &[Placement],
    ) -> StoreResult<Vec<Assignment>> {
        let _guard = self.lock();
        let mut assignments: Vec<Assignment> = self.read_collection(ASSIGNMENTS)?;
        assignments.retain(|assignment| assignment.user_id != user_id);

        let mut inserted = Vec::with_capacity(placements.len());
        for placement in placements {
            let assignment = Assignment {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                level_id: placement.level_id.clone(),
                skill_id: placement.skill_id.clone(),
                position: placement.position,
            };
            assignments.push(assignment.clone());
            inserted.push(assignment);
        }

        // Single write: readers observe either the old set or the new one.
        self.write_collection(ASSIGNMENTS, &assignments)?;
        Ok(inserted)
    }

    // ── Sessions ────────────────────────────────────────────────────────

    fn create_session(&self, user_id: &str, ttl: Duration) -> StoreResult<Session> {
        let _guard = self.lock();
        let mut sessions: Vec<Session> = self.read_collection(SESSIONS)?;
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            expires_at: Utc::now() + ttl,
        };
        sessions.push(session.clone());
        self.write_collection(SESSIONS, &sessions)?;
        Ok(session)
    }

    fn get_session(&self, token: &str) -> StoreResult<Option<Session>> {
        let _guard = self.lock();
        let mut sessions: Vec<Session> = self.read_collection(SESSIONS)?;
        let now = Utc::now();
        let expired_present = sessions.iter().any(|session| session.is_expired(now));
        if expired_present {
            sessions.retain(|session| !session.is_expired(now));
            self.write_collection(SESSIONS, &sessions)?;
        }
        Ok(sessions.into_iter().find(|session| session.id == token))
    }

    fn delete_session(&self, token: &str) -> StoreResult<bool> {
        let _guard = self.lock();
        let mut sessions: Vec<Session> = self.read_collection(SESSIONS)?;
        let before = sessions.len();
        sessions.retain(|session| session.id != token);
        let removed = sessions.len() != before;
        if removed {
            self.write_collection(SESSIONS, &sessions)?;
        }
        Ok(removed)
    }

    // ── Maintenance ─────────────────────────────────────────────────────

    fn reset(&self) -> StoreResult<()> {
        let _guard = self.lock();
        fs::create_dir_all(&self.data_dir)?;
        for name in COLLECTIONS {
            fs::write(self.collection_path(name), "[]\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, JsonStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn level_draft(name: &str, cost: u64, capacity: u32) -> LevelDraft {
        LevelDraft {
            name: name.to_string(),
            ordinal: 0,
            experience_needed: cost,
            new_skill_count: capacity,
        }
    }

    fn skill_draft(name: &str, cost: u64) -> SkillDraft {
        SkillDraft {
            name: name.to_string(),
            experience_needed: cost,
            emoji: "⭐".to_string(),
        }
    }

    #[test]
    fn open_seeds_empty_collection_files() {
        let (dir, _store) = store();
        for name in COLLECTIONS {
            let path = dir.path().join(format!("{name}.json"));
            assert!(path.exists(), "{name}.json missing");
        }
    }

    #[test]
    fn create_and_find_user() {
        let (_dir, store) = store();
        let created = store.create_user("tove").unwrap();
        assert_eq!(created.level, 0);
        assert_eq!(created.experience, 0);

        let found = store.get_user("tove").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(store.get_user("nobody").unwrap().is_none());

        let by_id = store.get_user_by_id(&created.id).unwrap().unwrap();
        assert_eq!(by_id.username, "tove");
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let (_dir, store) = store();
        store.create_user("tove").unwrap();
        assert!(store.create_user("tove").is_err());
    }

    #[test]
    fn set_user_experience_overwrites_experience_and_level() {
        let (_dir, store) = store();
        store.create_user("tove").unwrap();
        let updated = store.set_user_experience("tove", 25, 2).unwrap();
        assert_eq!(updated.experience, 25);
        assert_eq!(updated.level, 2);

        assert!(store.set_user_experience("nobody", 1, 0).is_err());
    }

    #[test]
    fn levels_sort_by_effective_ordinal() {
        let (_dir, store) = store();
        store.create_level(level_draft("Level 2", 10, 2)).unwrap();
        store.create_level(level_draft("Level 1", 10, 2)).unwrap();

        let levels = store.all_levels().unwrap();
        assert_eq!(levels[0].name, "Level 1");
        assert_eq!(levels[0].ordinal, 1);
        assert_eq!(levels[1].ordinal, 2);
    }

    #[test]
    fn update_level_replaces_fields_and_rederives_ordinal() {
        let (_dir, store) = store();
        let level = store.create_level(level_draft("Level 1", 10, 2)).unwrap();
        let updated = store
            .update_level(&level.id, level_draft("Level 3", 15, 4))
            .unwrap();
        assert_eq!(updated.ordinal, 3);
        assert_eq!(updated.experience_needed, 15);
        assert_eq!(updated.new_skill_count, 4);

        assert!(store.update_level("missing", level_draft("x", 1, 1)).is_err());
    }

    #[test]
    fn delete_level_cascades_assignments() {
        let (_dir, store) = store();
        let user = store.create_user("tove").unwrap();
        let level = store.create_level(level_draft("Level 1", 10, 2)).unwrap();
        let skill = store.create_skill(skill_draft("Sweep", 4)).unwrap();
        store
            .replace_assignments_for_user(
                &user.id,
                &[Placement {
                    level_id: level.id.clone(),
                    skill_id: skill.id.clone(),
                    position: 0,
                }],
            )
            .unwrap();

        store.delete_level(&level.id).unwrap();
        assert!(store.assignments_for_user(&user.id).unwrap().is_empty());
        assert!(store.delete_level(&level.id).is_err());
    }

    #[test]
    fn delete_skill_cascades_assignments() {
        let (_dir, store) = store();
        let user = store.create_user("tove").unwrap();
        let level = store.create_level(level_draft("Level 1", 10, 2)).unwrap();
        let skill = store.create_skill(skill_draft("Sweep", 4)).unwrap();
        store
            .replace_assignments_for_user(
                &user.id,
                &[Placement {
                    level_id: level.id.clone(),
                    skill_id: skill.id.clone(),
                    position: 0,
                }],
            )
            .unwrap();

        store.delete_skill(&skill.id).unwrap();
        assert!(store.assignments_for_user(&user.id).unwrap().is_empty());
        assert!(store.all_skills().unwrap().is_empty());
    }

    #[test]
    fn replace_assignments_reads_back_exactly_the_submitted_set() {
        let (_dir, store) = store();
        let user = store.create_user("tove").unwrap();
        let level = store.create_level(level_draft("Level 1", 10, 2)).unwrap();
        let sweep = store.create_skill(skill_draft("Sweep", 4)).unwrap();
        let mop = store.create_skill(skill_draft("Mop", 4)).unwrap();

        let first = vec![Placement {
            level_id: level.id.clone(),
            skill_id: sweep.id.clone(),
            position: 0,
        }];
        store.replace_assignments_for_user(&user.id, &first).unwrap();

        let second = vec![Placement {
            level_id: level.id.clone(),
            skill_id: mop.id.clone(),
            position: 0,
        }];
        store.replace_assignments_for_user(&user.id, &second).unwrap();

        let read_back = store.assignments_for_user(&user.id).unwrap();
        assert_eq!(read_back.len(), 1);
        assert_eq!(read_back[0].skill_id, mop.id);
    }

    #[test]
    fn replace_assignments_leaves_other_users_untouched() {
        let (_dir, store) = store();
        let tove = store.create_user("tove").unwrap();
        let mika = store.create_user("mika").unwrap();
        let level = store.create_level(level_draft("Level 1", 10, 2)).unwrap();
        let skill = store.create_skill(skill_draft("Sweep", 4)).unwrap();

        let placement = Placement {
            level_id: level.id.clone(),
            skill_id: skill.id.clone(),
            position: 0,
        };
        store
            .replace_assignments_for_user(&tove.id, std::slice::from_ref(&placement))
            .unwrap();
        store
            .replace_assignments_for_user(&mika.id, &[])
            .unwrap();

        assert_eq!(store.assignments_for_user(&tove.id).unwrap().len(), 1);
        assert!(store.assignments_for_user(&mika.id).unwrap().is_empty());
    }

    #[test]
    fn assignments_sort_by_level_ordinal_then_position() {
        let (_dir, store) = store();
        let user = store.create_user("tove").unwrap();
        let l2 = store.create_level(level_draft("Level 2", 10, 2)).unwrap();
        let l1 = store.create_level(level_draft("Level 1", 10, 2)).unwrap();
        let a = store.create_skill(skill_draft("A", 4)).unwrap();
        let b = store.create_skill(skill_draft("B", 4)).unwrap();
        let c = store.create_skill(skill_draft("C", 4)).unwrap();

        store
            .replace_assignments_for_user(
                &user.id,
                &[
                    Placement {
                        level_id: l2.id.clone(),
                        skill_id: c.id.clone(),
                        position: 0,
                    },
                    Placement {
                        level_id: l1.id.clone(),
                        skill_id: b.id.clone(),
                        position: 1,
                    },
                    Placement {
                        level_id: l1.id.clone(),
                        skill_id: a.id.clone(),
                        position: 0,
                    },
                ],
            )
            .unwrap();

        let ordered = store.assignments_for_user(&user.id).unwrap();
        let skill_ids: Vec<&str> = ordered.iter().map(|x| x.skill_id.as_str()).collect();
        assert_eq!(skill_ids, vec![a.id.as_str(), b.id.as_str(), c.id.as_str()]);
    }

    #[test]
    fn sessions_expire_and_are_pruned_on_read() {
        let (_dir, store) = store();
        let user = store.create_user("tove").unwrap();

        let live = store.create_session(&user.id, Duration::days(30)).unwrap();
        let stale = store.create_session(&user.id, Duration::seconds(-1)).unwrap();

        assert!(store.get_session(&live.id).unwrap().is_some());
        assert!(store.get_session(&stale.id).unwrap().is_none());

        assert!(store.delete_session(&live.id).unwrap());
        assert!(!store.delete_session(&live.id).unwrap());
    }

    #[test]
    fn corrupt_collection_self_heals_to_empty() {
        let (dir, store) = store();
        store.create_level(level_draft("Level 1", 10, 2)).unwrap();

        fs::write(dir.path().join("levels.json"), "{not json!").unwrap();
        let levels = store.all_levels().unwrap();
        assert!(levels.is_empty());

        // The file was reset, so subsequent writes work again.
        store.create_level(level_draft("Level 1", 10, 2)).unwrap();
        assert_eq!(store.all_levels().unwrap().len(), 1);
    }

    #[test]
    fn reset_clears_every_collection() {
        let (_dir, store) = store();
        store.create_user("tove").unwrap();
        store.create_level(level_draft("Level 1", 10, 2)).unwrap();
        store.create_skill(skill_draft("Sweep", 4)).unwrap();

        store.reset().unwrap();
        assert!(store.get_user("tove").unwrap().is_none());
        assert!(store.all_levels().unwrap().is_empty());
        assert!(store.all_skills().unwrap().is_empty());
    }
}
