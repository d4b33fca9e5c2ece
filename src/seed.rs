//! Starter catalog for a fresh install: five levels and the household chore
//! skills. Seeding upserts by name, so re-running refreshes costs without
//! duplicating records.

use crate::store::{LevelDraft, SkillDraft, Store, StoreResult};

const LEVEL_COUNT: u32 = 5;
const LEVEL_COST: u64 = 10;
const LEVEL_CAPACITY: u32 = 2;
const SKILL_COST: u64 = 4;

const STARTER_SKILLS: [(&str, &str); 10] = [
    ("Clean chairs", "🪑"),
    ("Water plants", "🪴"),
    ("Doors", "🚪"),
    ("Edges", "📏"),
    ("Clean Counters", "🧽"),
    ("Vacuum", "🌀"),
    ("Sweep", "🧹"),
    ("Mop", "🪣"),
    ("Put away dishes", "🍽️"),
    ("Garbage Can", "🗑️"),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct SeedSummary {
    pub levels_created: usize,
    pub levels_updated: usize,
    pub skills_created: usize,
    pub skills_updated: usize,
}

/// Upsert the starter catalog. Existing records matched by name are refreshed
/// in place; user data and assignments are untouched.
pub fn seed_catalog(store: &dyn Store) -> StoreResult<SeedSummary> {
    let mut summary = SeedSummary::default();

    let existing_levels = store.all_levels()?;
    for ordinal in 1..=LEVEL_COUNT {
        let name = format!("Level {ordinal}");
        let draft = LevelDraft {
            name: name.clone(),
            ordinal,
            experience_needed: LEVEL_COST,
            new_skill_count: LEVEL_CAPACITY,
        };
        match existing_levels.iter().find(|level| level.name == name) {
            Some(level) => {
                store.update_level(&level.id, draft)?;
                summary.levels_updated += 1;
            }
            None => {
                store.create_level(draft)?;
                summary.levels_created += 1;
            }
        }
    }

    let existing_skills = store.all_skills()?;
    for (name, emoji) in STARTER_SKILLS {
        let draft = SkillDraft {
            name: name.to_string(),
            experience_needed: SKILL_COST,
            emoji: emoji.to_string(),
        };
        match existing_skills.iter().find(|skill| skill.name == name) {
            Some(skill) => {
                store.update_skill(&skill.id, draft)?;
                summary.skills_updated += 1;
            }
            None => {
                store.create_skill(draft)?;
                summary.skills_created += 1;
            }
        }
    }

    Ok(summary)
}
