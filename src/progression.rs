//! The progression calculator: pure functions over a user's total experience,
//! the ordered level catalog, and the skills assigned to a level.
//!
//! Everything here is stateless and idempotent — repeated calls with the same
//! input yield identical output. No I/O, no clock, no panics on well-formed
//! input. Unlock state is always derived at read time from current
//! experience; it is never persisted.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{Level, Skill};

/// A user's full standing: current/next level, intra-level progress, and the
/// unlock state of each skill assigned to the upcoming level.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Ordinal of the highest level reached; 0 when no level is reached yet.
    pub level: u32,
    /// Ordinal of the next level, or `None` at max level.
    pub next_level: Option<u32>,
    pub experience: u64,
    pub level_progress: LevelProgress,
    pub skills: Vec<SkillProgress>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub exp_in_current_level: u64,
    /// Incremental cost of the next level, `None` at max level.
    pub exp_needed_for_next_level: Option<u64>,
    /// Always within [0, 100]. 0 at max level by convention, not 100.
    pub progress_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillProgress {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub experience_needed: u64,
    /// Absolute experience at which this skill unlocks: the level's starting
    /// experience plus the running sum of preceding same-level skills' costs
    /// plus this skill's own cost.
    pub cumulative_experience_needed: u64,
    pub is_unlocked: bool,
}

/// Per-level unlock states for a user's whole assigned tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeLevelUnlocks {
    pub level_id: String,
    pub skills: Vec<SkillProgress>,
}

/// The level catalog in progression order: malformed entries (no usable
/// ordinal) are excluded, the rest sorted ascending by ordinal.
fn ordered_catalog(levels: &[Level]) -> Vec<&Level> {
    let mut ordered: Vec<&Level> = levels
        .iter()
        .filter(|level| level.effective_ordinal() > 0)
        .collect();
    ordered.sort_by_key(|level| level.effective_ordinal());
    ordered
}

/// Running sums of `experience_needed` in ordinal order. `thresholds[i]` is
/// the total experience required to have reached `ordered[i]`.
fn cumulative_thresholds(ordered: &[&Level]) -> Vec<u64> {
    let mut thresholds = Vec::with_capacity(ordered.len());
    let mut running = 0u64;
    for level in ordered {
        running = running.saturating_add(level.experience_needed);
        thresholds.push(running);
    }
    thresholds
}

/// The ordinal of the highest level whose cumulative threshold is within
/// `experience`; 0 when none qualify.
pub fn level_for_experience(experience: u64, levels: &[Level]) -> u32 {
    let ordered = ordered_catalog(levels);
    let thresholds = cumulative_thresholds(&ordered);
    thresholds
        .iter()
        .rposition(|&threshold| threshold <= experience)
        .map_or(0, |i| ordered[i].effective_ordinal())
}

/// Compute the user's full standing.
///
/// `next_level_skills` must already be filtered to the upcoming level and
/// sorted by position; callers load them via the store.
pub fn compute_progress(
    experience: u64,
    levels: &[Level],
    next_level_skills: &[Skill],
) -> Progress {
    let ordered = ordered_catalog(levels);
    let thresholds = cumulative_thresholds(&ordered);

    let current_idx = thresholds
        .iter()
        .rposition(|&threshold| threshold <= experience);

    let current_ordinal = current_idx.map_or(0, |i| ordered[i].effective_ordinal());
    let level_start = current_idx.map_or(0, |i| thresholds[i]);

    let next_idx = match current_idx {
        Some(i) if i + 1 < ordered.len() => Some(i + 1),
        Some(_) => None,
        None if ordered.is_empty() => None,
        None => Some(0),
    };
    let next_ordinal = next_idx.map(|i| ordered[i].effective_ordinal());
    let exp_needed_for_next_level = next_idx.map(|i| ordered[i].experience_needed);

    // 0 at the exact "just arrived" boundary, since level_start == experience.
    let exp_in_current_level = experience - level_start;

    let progress_percentage = match exp_needed_for_next_level {
        #[allow(clippy::cast_precision_loss)]
        Some(needed) if needed > 0 => {
            ((exp_in_current_level as f64 / needed as f64) * 100.0).clamp(0.0, 100.0)
        }
        _ => 0.0,
    };

    let skills = unlock_run(experience, level_start, next_level_skills);

    Progress {
        level: current_ordinal,
        next_level: next_ordinal,
        experience,
        level_progress: LevelProgress {
            exp_in_current_level,
            exp_needed_for_next_level,
            progress_percentage,
        },
        skills,
    }
}

/// Unlock states for a user's whole assigned tree, level by level.
///
/// `skills_by_level` maps level id to that level's assigned skills in
/// position order. Skills in level n seed their running thresholds at the
/// experience where level n's band starts (the cumulative cost of n−1).
/// Levels without a usable ordinal are skipped.
pub fn compute_tree_unlocks(
    experience: u64,
    levels: &[Level],
    skills_by_level: &HashMap<String, Vec<Skill>>,
) -> Vec<TreeLevelUnlocks> {
    let ordered = ordered_catalog(levels);
    let thresholds = cumulative_thresholds(&ordered);

    ordered
        .iter()
        .enumerate()
        .map(|(i, level)| {
            let level_start = if i == 0 { 0 } else { thresholds[i - 1] };
            let skills = skills_by_level
                .get(&level.id)
                .map(|assigned| unlock_run(experience, level_start, assigned))
                .unwrap_or_default();
            TreeLevelUnlocks {
                level_id: level.id.clone(),
                skills,
            }
        })
        .collect()
}

fn unlock_run(experience: u64, level_start: u64, skills: &[Skill]) -> Vec<SkillProgress> {
    let mut threshold = level_start;
    skills
        .iter()
        .map(|skill| {
            threshold = threshold.saturating_add(skill.experience_needed);
            SkillProgress {
                id: skill.id.clone(),
                name: skill.name.clone(),
                emoji: skill.emoji.clone(),
                experience_needed: skill.experience_needed,
                cumulative_experience_needed: threshold,
                is_unlocked: experience >= threshold,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(ordinal: u32, experience_needed: u64) -> Level {
        Level {
            id: format!("level-{ordinal}"),
            name: format!("Level {ordinal}"),
            ordinal,
            experience_needed,
            new_skill_count: 2,
        }
    }

    fn skill(id: &str, experience_needed: u64) -> Skill {
        Skill {
            id: id.to_string(),
            name: id.to_string(),
            experience_needed,
            emoji: "⭐".to_string(),
        }
    }

    fn two_levels() -> Vec<Level> {
        vec![level(1, 10), level(2, 10)]
    }

    #[test]
    fn boundary_exactly_at_level_threshold() {
        let progress = compute_progress(10, &two_levels(), &[]);
        assert_eq!(progress.level, 1);
        assert_eq!(progress.next_level, Some(2));
        assert_eq!(progress.level_progress.exp_in_current_level, 0);
        assert_eq!(progress.level_progress.exp_needed_for_next_level, Some(10));
        assert!((progress.level_progress.progress_percentage - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn midway_through_a_level() {
        let progress = compute_progress(15, &two_levels(), &[]);
        assert_eq!(progress.level, 1);
        assert_eq!(progress.level_progress.exp_in_current_level, 5);
        assert!((progress.level_progress.progress_percentage - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn below_first_level_threshold() {
        let progress = compute_progress(7, &two_levels(), &[]);
        assert_eq!(progress.level, 0);
        assert_eq!(progress.next_level, Some(1));
        assert_eq!(progress.level_progress.exp_in_current_level, 7);
        assert!((progress.level_progress.progress_percentage - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn max_level_has_no_next_and_zero_percentage() {
        let progress = compute_progress(25, &two_levels(), &[]);
        assert_eq!(progress.level, 2);
        assert_eq!(progress.next_level, None);
        assert_eq!(progress.level_progress.exp_needed_for_next_level, None);
        assert_eq!(progress.level_progress.exp_in_current_level, 5);
        assert!((progress.level_progress.progress_percentage - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_catalog_yields_level_zero() {
        let progress = compute_progress(100, &[], &[]);
        assert_eq!(progress.level, 0);
        assert_eq!(progress.next_level, None);
        assert_eq!(progress.level_progress.exp_in_current_level, 100);
    }

    #[test]
    fn skill_unlock_running_sum_seeded_at_level_start() {
        let skills = vec![skill("a", 4), skill("b", 4)];
        let progress = compute_progress(5, &two_levels(), &skills);

        assert_eq!(progress.skills[0].cumulative_experience_needed, 4);
        assert_eq!(progress.skills[1].cumulative_experience_needed, 8);
        assert!(progress.skills[0].is_unlocked);
        assert!(!progress.skills[1].is_unlocked);
    }

    #[test]
    fn skill_thresholds_seed_at_current_level_cumulative() {
        // At experience 12 the user sits in Level 1 (threshold 10), so the
        // next level's skills seed at 10.
        let skills = vec![skill("a", 4), skill("b", 4)];
        let progress = compute_progress(12, &two_levels(), &skills);

        assert_eq!(progress.skills[0].cumulative_experience_needed, 14);
        assert_eq!(progress.skills[1].cumulative_experience_needed, 18);
        assert!(!progress.skills[0].is_unlocked);
    }

    #[test]
    fn current_level_is_monotone_in_experience() {
        let levels = vec![level(1, 10), level(2, 5), level(3, 20)];
        let mut previous = 0;
        for experience in 0..=40 {
            let current = level_for_experience(experience, &levels);
            assert!(
                current >= previous,
                "level dropped from {previous} to {current} at experience {experience}"
            );
            previous = current;
        }
    }

    #[test]
    fn percentage_always_within_bounds() {
        let levels = vec![level(1, 10), level(2, 0), level(3, 7)];
        for experience in 0..=30 {
            let progress = compute_progress(experience, &levels, &[]);
            let pct = progress.level_progress.progress_percentage;
            assert!((0.0..=100.0).contains(&pct), "pct {pct} at {experience}");
        }
    }

    #[test]
    fn zero_cost_level_collapses_onto_its_predecessor() {
        // A zero-cost level shares its predecessor's cumulative threshold, so
        // reaching that threshold lands on the later of the two.
        let levels = vec![level(1, 10), level(2, 0)];
        let below = compute_progress(3, &levels, &[]);
        assert!((below.level_progress.progress_percentage - 30.0).abs() < f64::EPSILON);

        let at_threshold = compute_progress(10, &levels, &[]);
        assert_eq!(at_threshold.level, 2);
        assert_eq!(at_threshold.next_level, None);
        assert!((at_threshold.level_progress.progress_percentage - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn identical_input_yields_identical_output() {
        let levels = two_levels();
        let skills = vec![skill("a", 4), skill("b", 4)];
        let first = compute_progress(15, &levels, &skills);
        let second = compute_progress(15, &levels, &skills);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn unordered_catalog_is_sorted_by_ordinal() {
        let levels = vec![level(2, 10), level(1, 10)];
        let progress = compute_progress(10, &levels, &[]);
        assert_eq!(progress.level, 1);
        assert_eq!(progress.next_level, Some(2));
    }

    #[test]
    fn malformed_level_names_are_excluded_from_the_catalog() {
        let mut levels = two_levels();
        levels.push(Level {
            id: "odd".into(),
            name: "Bonus Round".into(),
            ordinal: 0,
            experience_needed: 1000,
            new_skill_count: 1,
        });
        let progress = compute_progress(25, &levels, &[]);
        assert_eq!(progress.level, 2);
        assert_eq!(progress.next_level, None);
    }

    #[test]
    fn legacy_name_shim_orders_levels() {
        let legacy = |name: &str, cost: u64| Level {
            id: name.to_lowercase().replace(' ', "-"),
            name: name.to_string(),
            ordinal: 0,
            experience_needed: cost,
            new_skill_count: 2,
        };
        let levels = vec![legacy("Level 2", 10), legacy("Level 1", 10)];
        assert_eq!(level_for_experience(10, &levels), 1);
        assert_eq!(level_for_experience(20, &levels), 2);
    }

    #[test]
    fn tree_unlocks_seed_each_level_at_its_band_start() {
        let levels = two_levels();
        let mut by_level = HashMap::new();
        by_level.insert("level-1".to_string(), vec![skill("a", 4), skill("b", 4)]);
        by_level.insert("level-2".to_string(), vec![skill("c", 6)]);

        let tree = compute_tree_unlocks(11, &levels, &by_level);
        assert_eq!(tree.len(), 2);

        let first = &tree[0];
        assert_eq!(first.level_id, "level-1");
        assert_eq!(first.skills[0].cumulative_experience_needed, 4);
        assert_eq!(first.skills[1].cumulative_experience_needed, 8);
        assert!(first.skills[0].is_unlocked);
        assert!(first.skills[1].is_unlocked);

        let second = &tree[1];
        assert_eq!(second.level_id, "level-2");
        assert_eq!(second.skills[0].cumulative_experience_needed, 16);
        assert!(!second.skills[0].is_unlocked);
    }

    #[test]
    fn tree_unlocks_include_levels_with_no_assignments() {
        let levels = two_levels();
        let by_level = HashMap::new();
        let tree = compute_tree_unlocks(0, &levels, &by_level);
        assert_eq!(tree.len(), 2);
        assert!(tree.iter().all(|l| l.skills.is_empty()));
    }

    #[test]
    fn decreased_experience_revokes_unlocks_on_read() {
        let skills = vec![skill("a", 4)];
        let unlocked = compute_progress(5, &two_levels(), &skills);
        assert!(unlocked.skills[0].is_unlocked);

        let revoked = compute_progress(3, &two_levels(), &skills);
        assert!(!revoked.skills[0].is_unlocked);
    }
}
