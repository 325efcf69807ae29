//! Keyspace planner.
//!
//! Splits an attack's keyspace into uniform task slices sized so that one
//! slice takes a benchmarked agent roughly `target_slice_seconds` to
//! enumerate, bounded by the configured minimum and maximum runtimes. The
//! planner is pure: it reads benchmark medians handed in by the caller
//! and never touches the repositories itself, which keeps `plan`
//! deterministic for a given attack and benchmark set.

use uuid::Uuid;

use crate::domain::models::{Attack, SchedulerConfig, Task, TaskSpec, TaskState};

/// Outcome of a replan: slices to retire and fresh specs replacing them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replan {
    /// Pending/abandoned tasks superseded by the new slices
    pub retire: Vec<Uuid>,
    /// Replacement slices covering exactly the retired keyspace
    pub specs: Vec<TaskSpec>,
}

impl Replan {
    pub fn is_empty(&self) -> bool {
        self.retire.is_empty() && self.specs.is_empty()
    }
}

/// Computes task slices for attacks.
#[derive(Debug, Clone)]
pub struct KeyspacePlanner {
    config: SchedulerConfig,
}

impl KeyspacePlanner {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Slice size for the given planning speed (hashes/s). Falls back to
    /// the configured default speed when no benchmarks exist.
    pub fn slice_size(&self, median_speed: Option<f64>) -> u64 {
        let speed = median_speed
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(self.config.fallback_hash_speed);
        let target = self
            .config
            .target_slice_seconds
            .clamp(self.config.min_slice_seconds, self.config.max_slice_seconds);
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let size = (speed * target as f64) as u64;
        size.max(1)
    }

    /// Split the attack's whole keyspace into consecutive slices starting
    /// at zero. Slices are uniform except the last, which may be smaller.
    /// A zero keyspace yields no slices.
    pub fn plan(&self, attack: &Attack, median_speed: Option<f64>) -> Vec<TaskSpec> {
        slice_interval(0, attack.total_keyspace, self.slice_size(median_speed))
    }

    /// Recompute slices over the incomplete keyspace only: the union of
    /// pending and abandoned slices is retired and re-cut at the current
    /// slice size. Assigned, running, paused, and terminal slices are
    /// never disturbed.
    pub fn replan(&self, existing: &[Task], median_speed: Option<f64>) -> Replan {
        let mut incomplete: Vec<&Task> = existing
            .iter()
            .filter(|t| matches!(t.state, TaskState::Pending | TaskState::Abandoned))
            .collect();
        incomplete.sort_by_key(|t| t.keyspace_offset);

        if incomplete.is_empty() {
            return Replan::default();
        }

        let retire = incomplete.iter().map(|t| t.id).collect();
        let size = self.slice_size(median_speed);

        // Merge adjacent retired slices into contiguous gaps, then re-cut
        // each gap independently so untouched slices keep their intervals.
        let mut specs = Vec::new();
        let mut gap_start = incomplete[0].keyspace_offset;
        let mut gap_end = incomplete[0].keyspace_end();
        for task in &incomplete[1..] {
            if task.keyspace_offset == gap_end {
                gap_end = task.keyspace_end();
            } else {
                specs.extend(slice_interval(gap_start, gap_end, size));
                gap_start = task.keyspace_offset;
                gap_end = task.keyspace_end();
            }
        }
        specs.extend(slice_interval(gap_start, gap_end, size));

        Replan { retire, specs }
    }
}

/// Cut `[start, end)` into consecutive slices of `size`, last one smaller.
fn slice_interval(start: u64, end: u64, size: u64) -> Vec<TaskSpec> {
    let mut specs = Vec::new();
    let mut offset = start;
    while offset < end {
        let length = size.min(end - offset);
        specs.push(TaskSpec { keyspace_offset: offset, keyspace_length: length });
        offset += length;
    }
    specs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AttackMode;
    use proptest::prelude::*;

    fn planner() -> KeyspacePlanner {
        KeyspacePlanner::new(SchedulerConfig::default())
    }

    fn attack_with_keyspace(total: u64) -> Attack {
        Attack::new(Uuid::new_v4(), 1, AttackMode::Dictionary).with_keyspace(total)
    }

    #[test]
    fn zero_keyspace_produces_no_slices() {
        assert!(planner().plan(&attack_with_keyspace(0), Some(1000.0)).is_empty());
    }

    #[test]
    fn slices_are_uniform_except_the_last() {
        // 1000 h/s at the default 300 s target gives 300_000-candidate slices
        let specs = planner().plan(&attack_with_keyspace(700_000), Some(1000.0));
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0], TaskSpec { keyspace_offset: 0, keyspace_length: 300_000 });
        assert_eq!(specs[1], TaskSpec { keyspace_offset: 300_000, keyspace_length: 300_000 });
        assert_eq!(specs[2], TaskSpec { keyspace_offset: 600_000, keyspace_length: 100_000 });
    }

    #[test]
    fn plan_is_deterministic_for_identical_inputs() {
        let attack = attack_with_keyspace(1_234_567);
        assert_eq!(planner().plan(&attack, Some(4321.0)), planner().plan(&attack, Some(4321.0)));
    }

    #[test]
    fn missing_benchmarks_fall_back_to_configured_speed() {
        let specs = planner().plan(&attack_with_keyspace(10_000), None);
        // Fallback speed dwarfs the keyspace, so everything fits one slice
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].keyspace_length, 10_000);
    }

    #[test]
    fn replan_only_touches_pending_and_abandoned_slices() {
        let attack_id = Uuid::new_v4();
        let mut held = Task::from_spec(attack_id, TaskSpec { keyspace_offset: 0, keyspace_length: 100 });
        held.state = TaskState::Running;
        let mut done = Task::from_spec(attack_id, TaskSpec { keyspace_offset: 100, keyspace_length: 100 });
        done.state = TaskState::Exhausted;
        let pending = Task::from_spec(attack_id, TaskSpec { keyspace_offset: 200, keyspace_length: 100 });
        let mut abandoned = Task::from_spec(attack_id, TaskSpec { keyspace_offset: 300, keyspace_length: 50 });
        abandoned.state = TaskState::Abandoned;

        let replan = planner().replan(&[held.clone(), done, pending.clone(), abandoned.clone()], Some(1000.0));

        assert_eq!(replan.retire, vec![pending.id, abandoned.id]);
        // Contiguous gap [200, 350) comes back as one slice at this speed
        assert_eq!(replan.specs, vec![TaskSpec { keyspace_offset: 200, keyspace_length: 150 }]);
        assert!(!replan.retire.contains(&held.id));
    }

    #[test]
    fn replan_with_nothing_incomplete_is_empty() {
        let mut task = Task::from_spec(
            Uuid::new_v4(),
            TaskSpec { keyspace_offset: 0, keyspace_length: 10 },
        );
        task.state = TaskState::Running;
        assert!(planner().replan(&[task], Some(1000.0)).is_empty());
    }

    proptest! {
        #[test]
        fn slices_partition_the_keyspace(total in 0u64..1_000_000, speed in 10.0f64..1e7) {
            let specs = planner().plan(&attack_with_keyspace(total), Some(speed));
            let mut expected_offset = 0u64;
            for spec in &specs {
                prop_assert_eq!(spec.keyspace_offset, expected_offset);
                prop_assert!(spec.keyspace_length > 0);
                expected_offset += spec.keyspace_length;
            }
            prop_assert_eq!(expected_offset, total);
        }
    }
}
