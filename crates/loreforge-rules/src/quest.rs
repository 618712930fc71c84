//! Quest lifecycle rules.
//!
//! Quests reference other quests through `prerequisites`; the graph is
//! stored as ID lists and hydrated lazily, so the rules here must reject
//! any edit that would close a cycle. Objective progress keeps the
//! invariant `completed <=> current >= required` by updating the pair
//! atomically.

use std::collections::{BTreeMap, BTreeSet};

use loreforge_types::{Objective, Quest, QuestId, QuestLog};

use crate::error::RulesError;

// ---------------------------------------------------------------------------
// Prerequisite graph
// ---------------------------------------------------------------------------

/// Would giving `quest_id` the prerequisite list `prerequisites` create a
/// cycle, given the existing graph?
///
/// The graph maps each quest to its current prerequisites. A cycle exists
/// if any prerequisite can reach `quest_id` by following edges.
pub fn creates_cycle(
    quest_id: &QuestId,
    prerequisites: &[QuestId],
    graph: &BTreeMap<QuestId, Vec<QuestId>>,
) -> bool {
    let mut stack: Vec<&QuestId> = prerequisites.iter().collect();
    let mut visited: BTreeSet<&QuestId> = BTreeSet::new();

    while let Some(current) = stack.pop() {
        if current == quest_id {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(next) = graph.get(current) {
            stack.extend(next.iter());
        }
    }
    false
}

/// Validate a prerequisite list for create/update, rejecting self-reference
/// and cycles.
pub fn validate_prerequisites(
    quest_id: &QuestId,
    prerequisites: &[QuestId],
    graph: &BTreeMap<QuestId, Vec<QuestId>>,
) -> Result<(), RulesError> {
    if prerequisites.contains(quest_id) || creates_cycle(quest_id, prerequisites, graph) {
        return Err(RulesError::PrerequisiteCycle {
            quest: quest_id.clone(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// The prerequisites of `quest` that are not in the character's completed
/// list, in declaration order.
pub fn missing_prerequisites(quest: &Quest, log: &QuestLog) -> Vec<QuestId> {
    quest
        .prerequisites
        .iter()
        .filter(|prereq| !log.completed_quests.contains(prereq))
        .cloned()
        .collect()
}

/// Validate assigning `quest` to the character owning `log`.
///
/// The quest must not already be active or completed for the character,
/// and every prerequisite must appear in the completed list. The error
/// names the missing prerequisites.
pub fn validate_assignment(quest: &Quest, log: &QuestLog) -> Result<(), RulesError> {
    if log.active_quests.contains(&quest.id) {
        return Err(RulesError::QuestAlreadyHeld {
            quest: quest.id.clone(),
            state: "active",
        });
    }
    if log.completed_quests.contains(&quest.id) {
        return Err(RulesError::QuestAlreadyHeld {
            quest: quest.id.clone(),
            state: "completed",
        });
    }

    let missing = missing_prerequisites(quest, log);
    if !missing.is_empty() {
        return Err(RulesError::PrerequisitesUnmet {
            quest: quest.id.clone(),
            missing,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Objectives
// ---------------------------------------------------------------------------

/// The result of one objective-progress update.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveProgress {
    /// Progress before the update.
    pub previous: i64,
    /// Progress after the update (clamped to `required`).
    pub current: i64,
    /// The requirement.
    pub required: i64,
    /// Whether this update finished the objective.
    pub completed_now: bool,
}

/// Add `delta` to an objective's progress, clamping into `[0, required]`
/// and keeping `completed` in sync.
pub fn apply_objective_progress(objective: &mut Objective, delta: i64) -> ObjectiveProgress {
    let previous = objective.current;
    let was_complete = objective.completed;
    objective.current = objective
        .current
        .saturating_add(delta)
        .clamp(0, objective.required);
    objective.completed = objective.current >= objective.required;
    ObjectiveProgress {
        previous,
        current: objective.current,
        required: objective.required,
        completed_now: objective.completed && !was_complete,
    }
}

/// Mark an objective fully complete in one step.
pub fn complete_objective(objective: &mut Objective) -> ObjectiveProgress {
    let delta = objective.required.saturating_sub(objective.current);
    apply_objective_progress(objective, delta)
}

/// Human-readable progress label, e.g. `"2/5"`.
pub fn progress_label(objective: &Objective) -> String {
    format!("{}/{}", objective.current, objective.required)
}

/// How many objectives remain incomplete.
pub fn incomplete_count(quest: &Quest) -> usize {
    quest.objectives.iter().filter(|o| !o.completed).count()
}

/// Validate completing a quest: every objective must be complete.
pub fn validate_completion(quest: &Quest) -> Result<(), RulesError> {
    let incomplete = incomplete_count(quest);
    if incomplete > 0 {
        return Err(RulesError::ObjectivesIncomplete {
            quest: quest.id.clone(),
            incomplete,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use loreforge_types::{ObjectiveId, QuestRewards, QuestStatus, WorldId};

    use super::*;

    fn quest(id: &str, prerequisites: Vec<QuestId>) -> Quest {
        Quest {
            id: QuestId::new(id),
            world_id: WorldId::new("w-1"),
            name: id.to_owned(),
            description: String::new(),
            status: QuestStatus::Available,
            objectives: vec![objective("o-1", 3, 0)],
            rewards: QuestRewards::default(),
            prerequisites,
            giver: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn objective(id: &str, required: i64, current: i64) -> Objective {
        Objective {
            id: ObjectiveId::new(id),
            description: String::new(),
            objective_type: String::from("kill"),
            target: String::from("rats"),
            required,
            current,
            completed: current >= required,
        }
    }

    #[test]
    fn cycle_detection_walks_the_graph() {
        // q3 -> q2 -> q1; adding q1 -> q3 closes the loop.
        let mut graph = BTreeMap::new();
        graph.insert(QuestId::new("q2"), vec![QuestId::new("q1")]);
        graph.insert(QuestId::new("q3"), vec![QuestId::new("q2")]);

        assert!(creates_cycle(
            &QuestId::new("q1"),
            &[QuestId::new("q3")],
            &graph
        ));
        assert!(!creates_cycle(
            &QuestId::new("q4"),
            &[QuestId::new("q3")],
            &graph
        ));
    }

    #[test]
    fn self_prerequisite_is_a_cycle() {
        let graph = BTreeMap::new();
        let result = validate_prerequisites(
            &QuestId::new("q1"),
            &[QuestId::new("q1")],
            &graph,
        );
        assert!(matches!(result, Err(RulesError::PrerequisiteCycle { .. })));
    }

    #[test]
    fn assignment_requires_completed_prerequisites() {
        let q2 = quest("q2", vec![QuestId::new("q1")]);
        let empty_log = QuestLog::default();
        match validate_assignment(&q2, &empty_log) {
            Err(RulesError::PrerequisitesUnmet { missing, .. }) => {
                assert_eq!(missing, vec![QuestId::new("q1")]);
            }
            other => panic!("expected unmet prerequisites, got {other:?}"),
        }

        let satisfied = QuestLog {
            completed_quests: vec![QuestId::new("q1")],
            ..QuestLog::default()
        };
        assert!(validate_assignment(&q2, &satisfied).is_ok());
    }

    #[test]
    fn assignment_rejects_quests_already_held() {
        let q1 = quest("q1", Vec::new());
        let active = QuestLog {
            active_quests: vec![QuestId::new("q1")],
            ..QuestLog::default()
        };
        assert!(matches!(
            validate_assignment(&q1, &active),
            Err(RulesError::QuestAlreadyHeld { state: "active", .. })
        ));

        let done = QuestLog {
            completed_quests: vec![QuestId::new("q1")],
            ..QuestLog::default()
        };
        assert!(matches!(
            validate_assignment(&q1, &done),
            Err(RulesError::QuestAlreadyHeld {
                state: "completed",
                ..
            })
        ));
    }

    #[test]
    fn progress_clamps_and_flags_completion_once() {
        let mut obj = objective("o", 5, 0);
        let first = apply_objective_progress(&mut obj, 3);
        assert_eq!(first.current, 3);
        assert!(!first.completed_now);
        assert!(!obj.completed);

        let second = apply_objective_progress(&mut obj, 10);
        assert_eq!(second.current, 5);
        assert!(second.completed_now);
        assert!(obj.completed);

        // Already complete: no re-trigger.
        let third = apply_objective_progress(&mut obj, 1);
        assert!(!third.completed_now);
        assert_eq!(obj.current, 5);
    }

    #[test]
    fn negative_delta_cannot_push_below_zero() {
        let mut obj = objective("o", 5, 2);
        let progress = apply_objective_progress(&mut obj, -10);
        assert_eq!(progress.current, 0);
        assert!(!obj.completed);
    }

    #[test]
    fn completion_invariant_holds_both_directions() {
        let mut obj = objective("o", 4, 3);
        apply_objective_progress(&mut obj, 1);
        assert!(obj.completed && obj.current >= obj.required);
        apply_objective_progress(&mut obj, -2);
        assert!(!obj.completed && obj.current < obj.required);
    }

    #[test]
    fn complete_objective_jumps_to_required() {
        let mut obj = objective("o", 7, 2);
        let progress = complete_objective(&mut obj);
        assert_eq!(progress.current, 7);
        assert!(progress.completed_now);
        assert_eq!(progress_label(&obj), "7/7");
    }

    #[test]
    fn quest_completion_requires_every_objective() {
        let mut q = quest("q", Vec::new());
        q.objectives = vec![objective("a", 1, 1), objective("b", 2, 0)];
        assert!(matches!(
            validate_completion(&q),
            Err(RulesError::ObjectivesIncomplete { incomplete: 1, .. })
        ));

        q.objectives = vec![objective("a", 1, 1), objective("b", 2, 2)];
        assert!(validate_completion(&q).is_ok());
    }
}
