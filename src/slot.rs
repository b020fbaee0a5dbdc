use std::fmt;
use std::ops::{Index, IndexMut};

use crate::action::{Action, Pass};

/// One cell of a schedule table: a possibly-empty ordered list of
/// [`Action`]s plus the two event vectors attached to this `(time, stage)`
/// coordinate.
///
/// A `Slot` in the compute table carries at most one action (always a
/// Compute). A `Slot` in the compute-commute table carries at most two
/// actions: one Send and one Recv belonging to the same commute row.
#[derive(Debug, Clone, Default)]
pub struct Slot {
    actions: Vec<Action>,
    waited_events: Vec<i64>,
    recorded_events: Vec<i64>,
}

impl Slot {
    pub fn add_compute(&mut self, batch: u32, pass: Pass, upstream_time: i64, upstream_stage: i64) {
        self.actions
            .push(Action::compute(batch, pass, upstream_time, upstream_stage));
    }

    pub fn add_send(
        &mut self,
        batch: u32,
        pass: Pass,
        upstream_time: i64,
        upstream_stage: i64,
        this_rank: i64,
        peer_rank: i64,
    ) {
        self.actions.push(Action::send(
            batch,
            pass,
            upstream_time,
            upstream_stage,
            this_rank,
            peer_rank,
        ));
    }

    pub fn add_recv(
        &mut self,
        batch: u32,
        pass: Pass,
        upstream_time: i64,
        upstream_stage: i64,
        this_rank: i64,
        peer_rank: i64,
    ) {
        self.actions.push(Action::recv(
            batch,
            pass,
            upstream_time,
            upstream_stage,
            this_rank,
            peer_rank,
        ));
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn num_actions(&self) -> usize {
        self.actions.len()
    }

    pub fn has_compute(&self) -> bool {
        self.actions.iter().any(Action::is_compute)
    }

    /// Does this slot already carry a Send destined for `stage`?
    ///
    /// Compares each Send's destination against the *consumer* stage, not
    /// the producer — this is intentional, see the scheduler's expansion
    /// pass.
    pub fn has_send_to(&self, stage: i64) -> bool {
        self.actions.iter().any(|a| a.is_send_to(stage))
    }

    pub fn has_recv_from(&self, stage: i64) -> bool {
        self.actions.iter().any(|a| a.is_recv_from(stage))
    }

    /// The first action in this slot.
    ///
    /// Panics if the slot is empty — callers must check [`Slot::is_empty`]
    /// first, matching the precondition of the source's `front()` accessor.
    pub fn front(&self) -> &Action {
        self.actions.first().expect("front() called on an empty slot")
    }

    pub fn waited_events(&self) -> &[i64] {
        &self.waited_events
    }

    pub fn set_waited_events(&mut self, events: Vec<i64>) {
        self.waited_events = events;
    }

    pub fn recorded_events(&self) -> &[i64] {
        &self.recorded_events
    }

    pub fn set_recorded_events(&mut self, events: Vec<i64>) {
        self.recorded_events = events;
    }
}

impl Index<usize> for Slot {
    type Output = Action;

    fn index(&self, index: usize) -> &Action {
        &self.actions[index]
    }
}

impl IndexMut<usize> for Slot {
    fn index_mut(&mut self, index: usize) -> &mut Action {
        &mut self.actions[index]
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.actions.len() {
            0 => write!(f, "        "),
            1 => write!(f, "{}    ", self.actions[0]),
            _ => {
                write!(f, "{}", self.actions[0])?;
                write!(f, "{}", self.actions[1])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_renders_eight_spaces() {
        let slot = Slot::default();
        assert!(slot.is_empty());
        assert_eq!(slot.to_string(), "        ");
    }

    #[test]
    fn one_action_slot_pads_to_eight_chars() {
        let mut slot = Slot::default();
        slot.add_compute(2, Pass::Forward, -1, -1);
        assert_eq!(slot.to_string(), "FW02    ");
        assert!(slot.has_compute());
    }

    #[test]
    fn two_action_slot_prints_both_tokens() {
        let mut slot = Slot::default();
        slot.add_send(1, Pass::Forward, 0, 0, 0, 1);
        slot.add_recv(1, Pass::Forward, 0, 1, 1, 0);
        assert_eq!(slot.to_string(), "FS01FR01");
        assert!(slot.has_send_to(1));
        assert!(slot.has_recv_from(0));
        assert!(!slot.has_compute());
    }

    #[test]
    #[should_panic(expected = "front() called on an empty slot")]
    fn front_panics_on_empty_slot() {
        Slot::default().front();
    }
}
