//! Step Sequencer
//!
//! Linear wizard progression over a fixed list of steps. The active index
//! never leaves `[0, steps.len() - 1]`; completed and skipped sets only grow
//! until [`StepSequencer::reset_stepper`].

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::completion::percentage;
use crate::types::FormData;

/// One wizard step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescriptor {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
}

impl StepDescriptor {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Gate consulted before leaving a step: `(step_index, form_data) -> may_advance`
pub type StepValidator = Arc<dyn Fn(usize, &FormData) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct StepSequencer {
    steps: Vec<StepDescriptor>,
    active_step: usize,
    completed: BTreeSet<usize>,
    skipped: BTreeSet<usize>,
    validator: Option<StepValidator>,
}

impl std::fmt::Debug for StepSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepSequencer")
            .field("steps", &self.steps.len())
            .field("active_step", &self.active_step)
            .field("completed", &self.completed)
            .field("skipped", &self.skipped)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl StepSequencer {
    pub fn new(steps: Vec<StepDescriptor>) -> Self {
        Self {
            steps,
            active_step: 0,
            completed: BTreeSet::new(),
            skipped: BTreeSet::new(),
            validator: None,
        }
    }

    /// Attach a per-step gate for [`StepSequencer::next_step`].
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(usize, &FormData) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Complete the current step and advance.
    ///
    /// Returns false without touching any state when already on the last
    /// step or when the validator rejects the current step.
    pub fn next_step(&mut self, form_data: &FormData) -> bool {
        if self.is_last_step() {
            return false;
        }
        if let Some(validator) = &self.validator {
            if !validator(self.active_step, form_data) {
                debug!(step = self.active_step, "Step validation blocked advance");
                return false;
            }
        }
        self.completed.insert(self.active_step);
        self.active_step += 1;
        true
    }

    pub fn previous_step(&mut self) -> bool {
        if self.active_step == 0 {
            return false;
        }
        self.active_step -= 1;
        true
    }

    /// Direct jump, e.g. from a step indicator click. No bookkeeping.
    pub fn go_to_step(&mut self, index: usize) -> bool {
        if index >= self.steps.len() {
            return false;
        }
        self.active_step = index;
        true
    }

    /// Out-of-range indices are ignored.
    pub fn complete_step(&mut self, index: usize) -> bool {
        index < self.steps.len() && self.completed.insert(index)
    }

    pub fn skip_step(&mut self, index: usize) -> bool {
        index < self.steps.len() && self.skipped.insert(index)
    }

    /// Percentage of steps marked completed.
    pub fn progress(&self) -> u8 {
        percentage(self.completed.len(), self.steps.len())
    }

    pub fn reset_stepper(&mut self) {
        self.active_step = 0;
        self.completed.clear();
        self.skipped.clear();
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn active_step(&self) -> usize {
        self.active_step
    }

    pub fn current(&self) -> Option<&StepDescriptor> {
        self.steps.get(self.active_step)
    }

    pub fn is_first_step(&self) -> bool {
        self.active_step == 0
    }

    /// True for an empty sequence too; there is nowhere to advance to.
    pub fn is_last_step(&self) -> bool {
        self.active_step + 1 >= self.steps.len()
    }

    pub fn is_step_completed(&self, index: usize) -> bool {
        self.completed.contains(&index)
    }

    pub fn is_step_skipped(&self, index: usize) -> bool {
        self.skipped.contains(&index)
    }

    pub fn completed_steps(&self) -> &BTreeSet<usize> {
        &self.completed
    }

    pub fn skipped_steps(&self) -> &BTreeSet<usize> {
        &self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn steps(n: usize) -> Vec<StepDescriptor> {
        (0..n)
            .map(|i| StepDescriptor::new(format!("step-{}", i), format!("Step {}", i + 1)))
            .collect()
    }

    #[test]
    fn test_next_and_previous() {
        let mut stepper = StepSequencer::new(steps(3));
        let data = FormData::new();

        assert!(!stepper.previous_step());
        assert!(stepper.next_step(&data));
        assert!(stepper.next_step(&data));
        assert_eq!(stepper.active_step(), 2);
        assert_eq!(stepper.progress(), 67);

        // Last step: no advance, not completed.
        assert!(!stepper.next_step(&data));
        assert_eq!(stepper.active_step(), 2);
        assert!(!stepper.is_step_completed(2));

        assert!(stepper.previous_step());
        assert_eq!(stepper.current().map(|s| s.id.as_str()), Some("step-1"));
    }

    #[test]
    fn test_validator_blocks_advance() {
        let mut stepper = StepSequencer::new(steps(3)).with_validator(|step, data| {
            step != 0 || data.get("consent") == Some(&json!(true))
        });

        let mut data = FormData::new();
        assert!(!stepper.next_step(&data));
        assert_eq!(stepper.active_step(), 0);
        assert!(stepper.completed_steps().is_empty());

        data.insert("consent".into(), json!(true));
        assert!(stepper.next_step(&data));
        assert!(stepper.is_step_completed(0));
    }

    #[test]
    fn test_go_to_step_bypasses_bookkeeping() {
        let mut stepper = StepSequencer::new(steps(4));
        assert!(stepper.go_to_step(3));
        assert!(stepper.completed_steps().is_empty());
        assert!(!stepper.go_to_step(4));
        assert_eq!(stepper.active_step(), 3);
    }

    #[test]
    fn test_complete_and_skip_can_overlap() {
        let mut stepper = StepSequencer::new(steps(2));
        assert!(stepper.complete_step(1));
        assert!(stepper.skip_step(1));
        assert!(!stepper.skip_step(5));
        assert!(stepper.is_step_completed(1) && stepper.is_step_skipped(1));
        assert_eq!(stepper.progress(), 50);

        stepper.go_to_step(1);
        stepper.reset_stepper();
        assert_eq!(stepper.active_step(), 0);
        assert!(stepper.completed_steps().is_empty());
        assert!(stepper.skipped_steps().is_empty());
    }

    #[test]
    fn test_empty_sequence() {
        let mut stepper = StepSequencer::new(Vec::new());
        assert!(!stepper.next_step(&FormData::new()));
        assert!(!stepper.go_to_step(0));
        assert_eq!(stepper.progress(), 0);
        assert!(stepper.current().is_none());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Next,
            Previous,
            GoTo(usize),
            Complete(usize),
            Skip(usize),
            Reset,
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                Just(Op::Next),
                Just(Op::Previous),
                (0usize..12).prop_map(Op::GoTo),
                (0usize..12).prop_map(Op::Complete),
                (0usize..12).prop_map(Op::Skip),
                Just(Op::Reset),
            ]
        }

        proptest! {
            #[test]
            fn active_step_stays_in_bounds(n in 1usize..8, ops in prop::collection::vec(op(), 0..64)) {
                let mut stepper = StepSequencer::new(steps(n));
                let data = FormData::new();
                for op in ops {
                    match op {
                        Op::Next => { stepper.next_step(&data); }
                        Op::Previous => { stepper.previous_step(); }
                        Op::GoTo(i) => { stepper.go_to_step(i); }
                        Op::Complete(i) => { stepper.complete_step(i); }
                        Op::Skip(i) => { stepper.skip_step(i); }
                        Op::Reset => stepper.reset_stepper(),
                    }
                    prop_assert!(stepper.active_step() < n);
                    prop_assert!(stepper.progress() <= 100);
                    prop_assert!(stepper.completed_steps().iter().all(|i| *i < n));
                }
            }
        }
    }
}
