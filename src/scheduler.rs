use std::fmt;

use tracing::{debug, info};

use crate::action::{ActionKind, Pass, NONE};
use crate::error::SchedulerError;
use crate::slot::Slot;

/// A deterministic, offline 1F1B pipeline-parallel schedule.
///
/// Built once from `(num_batches, num_stages)` by [`Scheduler::new`] and
/// never mutated afterward. All queries are pure reads over the resulting
/// tables and may be called concurrently from many consumers without
/// synchronization.
pub struct Scheduler {
    num_batches: usize,
    num_stages: usize,
    compute_table: Vec<Vec<Slot>>,
    compute_commute_table: Vec<Vec<Slot>>,
    compute_batch_count: Vec<usize>,
}

impl Scheduler {
    /// Build the schedule for `num_batches` micro-batches across
    /// `num_stages` pipeline stages.
    pub fn new(num_batches: usize, num_stages: usize) -> Result<Self, SchedulerError> {
        if num_stages == 0 {
            return Err(SchedulerError::ZeroStages);
        }
        if num_batches == 0 {
            return Err(SchedulerError::ZeroBatches);
        }

        let mut scheduler = Self {
            num_batches,
            num_stages,
            compute_table: Vec::new(),
            compute_commute_table: Vec::new(),
            compute_batch_count: Vec::new(),
        };

        scheduler.build_compute_schedule();
        Self::insert_events(&mut scheduler.compute_table, num_stages, 2, vec![-1, -1]);

        scheduler.build_full_schedule();
        Self::insert_events(&mut scheduler.compute_commute_table, num_stages, 1, vec![-1]);

        info!(
            num_batches,
            num_stages,
            compute_rows = scheduler.compute_table.len(),
            full_rows = scheduler.compute_commute_table.len(),
            "pipeline schedule constructed"
        );

        Ok(scheduler)
    }

    // -- sizes --------------------------------------------------------

    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    pub fn num_stages(&self) -> usize {
        self.num_stages
    }

    /// Number of rows (`T_c`) in the compute-only table.
    pub fn compute_rows(&self) -> usize {
        self.compute_table.len()
    }

    /// Number of rows (`T_f`) in the compute-commute table.
    pub fn full_rows(&self) -> usize {
        self.compute_commute_table.len()
    }

    /// How many batches are in flight (forward started, backward not yet
    /// finished at stage 0) at time `t`.
    pub fn compute_batch_count(&self, t: usize) -> usize {
        self.compute_batch_count[t]
    }

    pub fn compute_slot(&self, t: usize, s: usize) -> &Slot {
        &self.compute_table[t][s]
    }

    pub fn full_slot(&self, t: usize, s: usize) -> &Slot {
        &self.compute_commute_table[t][s]
    }

    // -- compute-table placement (1F1B) --------------------------------

    fn build_compute_schedule(&mut self) {
        let compute_max_time = 2 * self.num_stages + 2 * (self.num_batches - 1);

        self.compute_table = (0..compute_max_time)
            .map(|_| (0..self.num_stages).map(|_| Slot::default()).collect())
            .collect();
        self.compute_batch_count = vec![0; compute_max_time];

        let mut forward_time = vec![0i64; self.num_stages];
        let mut backward_time = vec![0i64; self.num_stages];

        for batch in 0..self.num_batches as u32 {
            // The search on stage s starts at time forward_time[s] from the
            // previous batch.
            forward_time = self.find_forward_compute_time(&forward_time);
            self.insert_forward_compute(batch, &forward_time);

            backward_time = self.find_backward_compute_time(&forward_time);
            self.insert_backward_compute(batch, &forward_time, &backward_time);

            // A batch occupies the pipeline, as measured at stage 0, for the
            // whole interval between its forward and backward there.
            for t in forward_time[0]..=backward_time[0] {
                self.compute_batch_count[t as usize] += 1;
            }

            debug!(
                batch,
                ?forward_time,
                ?backward_time,
                "placed batch in compute schedule"
            );
        }
    }

    fn find_forward_compute_time(&self, previous_forward_time: &[i64]) -> Vec<i64> {
        let mut forward_time = vec![0i64; self.num_stages];

        for s in 0..self.num_stages {
            let mut found = None;
            for t in previous_forward_time[s]..self.compute_table.len() as i64 {
                if !self.compute_table[t as usize][s].is_empty() {
                    // One slot cannot be occupied by two batches.
                    continue;
                }
                if s > 0 && t <= forward_time[s - 1] {
                    // Forward of stage s must happen strictly after forward
                    // of stage s - 1.
                    continue;
                }
                if self.compute_batch_count[t as usize] >= self.num_stages {
                    // Steady-state 1F1B bound: at most num_stages batches in
                    // flight at once.
                    continue;
                }
                found = Some(t);
                break;
            }
            forward_time[s] = found
                .expect("forward compute search exhausted the compute table: scheduler invariant violated");
        }

        forward_time
    }

    fn find_backward_compute_time(&self, forward_time: &[i64]) -> Vec<i64> {
        let mut backward_time = vec![0i64; self.num_stages];

        // For a given batch, the last stage has the earliest backward
        // computation, so this scans stages in descending order.
        for s in (0..self.num_stages).rev() {
            let mut found = None;
            for t in (forward_time[s] + 1)..self.compute_table.len() as i64 {
                if !self.compute_table[t as usize][s].is_empty() {
                    continue;
                }
                if s < self.num_stages - 1 && t <= backward_time[s + 1] {
                    // Backward flows from the last stage to the first.
                    continue;
                }
                if self.compute_batch_count[t as usize] >= self.num_stages {
                    continue;
                }
                found = Some(t);
                break;
            }
            backward_time[s] = found
                .expect("backward compute search exhausted the compute table: scheduler invariant violated");
        }

        backward_time
    }

    fn insert_forward_compute(&mut self, batch: u32, forward_time: &[i64]) {
        for s in 0..self.num_stages {
            let t = forward_time[s] as usize;
            if s == 0 {
                // The first forward compute has no upstream.
                self.compute_table[t][s].add_compute(batch, Pass::Forward, NONE, NONE);
            } else {
                // Forward at stage s depends on forward at stage s - 1.
                self.compute_table[t][s].add_compute(batch, Pass::Forward, forward_time[s - 1], (s - 1) as i64);
            }
        }
    }

    fn insert_backward_compute(&mut self, batch: u32, forward_time: &[i64], backward_time: &[i64]) {
        let last_stage = self.num_stages - 1;
        for s in (0..self.num_stages).rev() {
            let t = backward_time[s] as usize;
            if s == last_stage {
                // The first backward (on the last stage) pivots off the
                // forward on that same stage.
                self.compute_table[t][s].add_compute(batch, Pass::Backward, forward_time[s], s as i64);
            } else {
                // Backward at stage s depends on backward at stage s + 1.
                self.compute_table[t][s].add_compute(batch, Pass::Backward, backward_time[s + 1], (s + 1) as i64);
            }
        }
    }

    // -- compute-commute expansion --------------------------------------

    fn build_full_schedule(&mut self) {
        let mut full_table: Vec<Vec<Slot>> = Vec::new();

        for t in 0..self.compute_table.len() {
            // The previous compute row is already present; precede every
            // row but the first with an empty commute row.
            if t != 0 {
                full_table.push((0..self.num_stages).map(|_| Slot::default()).collect());
            }

            for s in 0..self.num_stages {
                let slot = &self.compute_table[t][s];
                if slot.is_empty() {
                    continue;
                }
                assert_eq!(
                    slot.num_actions(),
                    1,
                    "compute-only schedule slot must hold exactly one Compute action"
                );

                let action = *slot.front();
                let upstream_stage = action.upstream_stage;
                let upstream_time = action.upstream_time;

                if upstream_stage < 0 && upstream_time < 0 {
                    // No upstream: nothing to connect.
                    continue;
                }
                if s == self.num_stages - 1 && action.is_backward() && action.is_compute() {
                    // Last-stage forward -> backward pivot: same stage,
                    // no cross-stage transfer needed.
                    continue;
                }

                let upstream_slot = &self.compute_table[upstream_time as usize][upstream_stage as usize];
                let upstream_action = *upstream_slot.front();
                let upstream_compute_time = upstream_action.full_table_time;

                let recv_pass = if action.is_forward() { Pass::Forward } else { Pass::Backward };
                let send_pass = if upstream_action.is_forward() { Pass::Forward } else { Pass::Backward };

                let good_time = Self::find_send_recv_time(
                    &full_table,
                    self.num_stages,
                    upstream_compute_time,
                    upstream_stage,
                    s as i64,
                );

                full_table[good_time as usize][upstream_stage as usize].add_send(
                    action.batch,
                    send_pass,
                    upstream_compute_time,
                    upstream_stage,
                    upstream_stage,
                    s as i64,
                );
                full_table[good_time as usize][s].add_recv(
                    action.batch,
                    recv_pass,
                    good_time,
                    s as i64,
                    s as i64,
                    upstream_stage,
                );
            }

            // Stamp the back-reference to where this compute row's actions
            // will land in the full table, so later rows can resolve their
            // upstream's placement.
            let full_time = full_table.len() as i64;
            for s in 0..self.num_stages {
                for a in 0..self.compute_table[t][s].num_actions() {
                    self.compute_table[t][s][a].full_table_time = full_time;
                    self.compute_table[t][s][a].full_table_stage = s as i64;
                }
            }

            full_table.push(self.compute_table[t].clone());
        }

        self.compute_commute_table = full_table;
    }

    /// Scan the compute-commute table built so far, from its highest index
    /// downward toward (exclusive) `upstream_time`, for the latest row
    /// where every stage has no Compute, no Recv-from `upstream_stage`, and
    /// no Send-to `stage`.
    fn find_send_recv_time(
        full_table: &[Vec<Slot>],
        num_stages: usize,
        upstream_time: i64,
        upstream_stage: i64,
        stage: i64,
    ) -> i64 {
        for t_full in ((upstream_time + 1)..full_table.len() as i64).rev() {
            let row_is_free = (0..num_stages).all(|s| {
                let candidate = &full_table[t_full as usize][s];
                !candidate.has_compute()
                    && !candidate.has_recv_from(upstream_stage)
                    && !candidate.has_send_to(stage)
            });
            if row_is_free {
                return t_full;
            }
        }
        panic!("no free row found for send/recv placement: scheduler invariant violated")
    }

    // -- event numbering --------------------------------------------------

    fn insert_events(table: &mut [Vec<Slot>], num_stages: usize, k: usize, initial_events: Vec<i64>) {
        let mut last_recorded: Vec<Vec<i64>> = vec![initial_events; num_stages];

        for row in table.iter_mut() {
            for s in 0..num_stages {
                if row[s].is_empty() {
                    continue;
                }
                row[s].set_waited_events(last_recorded[s].clone());

                let max_event = *last_recorded[s].iter().max().unwrap();
                let new_recorded: Vec<i64> = (1..=k as i64).map(|i| max_event + i).collect();
                row[s].set_recorded_events(new_recorded.clone());

                last_recorded[s] = new_recorded;
            }
        }
    }

    // -- query surface: compute-commute table, 12 symmetric lookups ------

    fn try_get_event(
        &self,
        is_waited: bool,
        batch: u32,
        stage: usize,
        pass: Pass,
        kind: ActionKind,
    ) -> Option<Vec<i64>> {
        for row in &self.compute_commute_table {
            let slot = &row[stage];
            for a in 0..slot.num_actions() {
                let op = &slot[a];
                if op.batch == batch && op.pass == pass && op.kind == kind {
                    return Some(if is_waited {
                        slot.waited_events().to_vec()
                    } else {
                        slot.recorded_events().to_vec()
                    });
                }
            }
        }
        None
    }

    fn event_or_default(&self, is_waited: bool, batch: u32, stage: usize, pass: Pass, kind: ActionKind) -> i64 {
        match self.try_get_event(is_waited, batch, stage, pass, kind) {
            Some(events) => events[0],
            None => -1,
        }
    }

    pub fn forward_compute_waited_event(&self, batch: u32, stage: usize) -> i64 {
        self.event_or_default(true, batch, stage, Pass::Forward, ActionKind::Compute)
    }

    pub fn forward_compute_recorded_event(&self, batch: u32, stage: usize) -> i64 {
        self.event_or_default(false, batch, stage, Pass::Forward, ActionKind::Compute)
    }

    pub fn backward_compute_waited_event(&self, batch: u32, stage: usize) -> i64 {
        self.event_or_default(true, batch, stage, Pass::Backward, ActionKind::Compute)
    }

    pub fn backward_compute_recorded_event(&self, batch: u32, stage: usize) -> i64 {
        self.event_or_default(false, batch, stage, Pass::Backward, ActionKind::Compute)
    }

    pub fn forward_send_waited_event(&self, batch: u32, stage: usize) -> i64 {
        self.event_or_default(true, batch, stage, Pass::Forward, ActionKind::Send)
    }

    pub fn forward_send_recorded_event(&self, batch: u32, stage: usize) -> i64 {
        self.event_or_default(false, batch, stage, Pass::Forward, ActionKind::Send)
    }

    pub fn backward_send_waited_event(&self, batch: u32, stage: usize) -> i64 {
        self.event_or_default(true, batch, stage, Pass::Backward, ActionKind::Send)
    }

    pub fn backward_send_recorded_event(&self, batch: u32, stage: usize) -> i64 {
        self.event_or_default(false, batch, stage, Pass::Backward, ActionKind::Send)
    }

    pub fn forward_recv_waited_event(&self, batch: u32, stage: usize) -> i64 {
        self.event_or_default(true, batch, stage, Pass::Forward, ActionKind::Recv)
    }

    pub fn forward_recv_recorded_event(&self, batch: u32, stage: usize) -> i64 {
        self.event_or_default(false, batch, stage, Pass::Forward, ActionKind::Recv)
    }

    pub fn backward_recv_waited_event(&self, batch: u32, stage: usize) -> i64 {
        self.event_or_default(true, batch, stage, Pass::Backward, ActionKind::Recv)
    }

    pub fn backward_recv_recorded_event(&self, batch: u32, stage: usize) -> i64 {
        self.event_or_default(false, batch, stage, Pass::Backward, ActionKind::Recv)
    }

    // -- query surface: compute-only table, 8 "bracket" lookups ---------

    fn try_get_compute_event(&self, batch: u32, stage: usize, pass: Pass, kind: ActionKind) -> Option<Vec<i64>> {
        for row in &self.compute_table {
            let slot = &row[stage];
            for a in 0..slot.num_actions() {
                let op = &slot[a];
                if op.batch == batch && op.pass == pass && op.kind == ActionKind::Compute {
                    return Some(if kind == ActionKind::Recv {
                        slot.waited_events().to_vec()
                    } else {
                        slot.recorded_events().to_vec()
                    });
                }
            }
        }
        None
    }

    fn compute_event_or_default(&self, is_before: bool, batch: u32, stage: usize, pass: Pass, kind: ActionKind) -> i64 {
        match self.try_get_compute_event(batch, stage, pass, kind) {
            Some(events) if is_before => events[0],
            Some(events) => *events.last().unwrap(),
            None => -1,
        }
    }

    pub fn forward_waited_event_before_recv(&self, batch: u32, stage: usize) -> i64 {
        self.compute_event_or_default(true, batch, stage, Pass::Forward, ActionKind::Recv)
    }

    pub fn forward_waited_event_after_recv(&self, batch: u32, stage: usize) -> i64 {
        self.compute_event_or_default(false, batch, stage, Pass::Forward, ActionKind::Recv)
    }

    pub fn forward_recorded_event_before_send(&self, batch: u32, stage: usize) -> i64 {
        self.compute_event_or_default(true, batch, stage, Pass::Forward, ActionKind::Send)
    }

    pub fn forward_recorded_event_after_send(&self, batch: u32, stage: usize) -> i64 {
        self.compute_event_or_default(false, batch, stage, Pass::Forward, ActionKind::Send)
    }

    pub fn backward_waited_event_before_recv(&self, batch: u32, stage: usize) -> i64 {
        self.compute_event_or_default(true, batch, stage, Pass::Backward, ActionKind::Recv)
    }

    pub fn backward_waited_event_after_recv(&self, batch: u32, stage: usize) -> i64 {
        self.compute_event_or_default(false, batch, stage, Pass::Backward, ActionKind::Recv)
    }

    pub fn backward_recorded_event_before_send(&self, batch: u32, stage: usize) -> i64 {
        self.compute_event_or_default(true, batch, stage, Pass::Backward, ActionKind::Send)
    }

    pub fn backward_recorded_event_after_send(&self, batch: u32, stage: usize) -> i64 {
        self.compute_event_or_default(false, batch, stage, Pass::Backward, ActionKind::Send)
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-------------View of Compute Schedule-------------")?;
        for s in 0..self.num_stages {
            for row in &self.compute_table {
                write!(f, "{}", row[s])?;
            }
            writeln!(f)?;
        }

        writeln!(f, "-------------View of Compute-commute Schedule-------------")?;
        for s in 0..self.num_stages {
            for row in &self.compute_commute_table {
                write!(f, "{}", row[s])?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_stages_error() {
        assert_eq!(Scheduler::new(4, 0).unwrap_err(), SchedulerError::ZeroStages);
    }

    #[test]
    fn zero_batches_error() {
        assert_eq!(Scheduler::new(0, 3).unwrap_err(), SchedulerError::ZeroBatches);
    }

    #[test]
    fn single_stage_single_batch_render() {
        let s = Scheduler::new(1, 1).unwrap();
        assert_eq!(s.compute_rows(), 2);
        let mut row = String::new();
        for t in 0..s.compute_rows() {
            row.push_str(&s.compute_slot(t, 0).to_string());
        }
        assert_eq!(row, "FW00BW00");
    }

    #[test]
    fn one_batch_two_stages_placement() {
        let s = Scheduler::new(1, 2).unwrap();
        assert_eq!(s.compute_rows(), 4);

        assert_eq!(s.compute_slot(0, 0).to_string(), "FW00    ");
        assert_eq!(s.compute_slot(1, 0).to_string(), "        ");
        assert_eq!(s.compute_slot(2, 0).to_string(), "        ");
        assert_eq!(s.compute_slot(3, 0).to_string(), "BW00    ");

        assert_eq!(s.compute_slot(0, 1).to_string(), "        ");
        assert_eq!(s.compute_slot(1, 1).to_string(), "FW00    ");
        assert_eq!(s.compute_slot(2, 1).to_string(), "BW00    ");
        assert_eq!(s.compute_slot(3, 1).to_string(), "        ");
    }

    #[test]
    fn render_is_idempotent() {
        let s = Scheduler::new(4, 4).unwrap();
        assert_eq!(s.to_string(), s.to_string());
    }

    #[test]
    fn unknown_batch_returns_sentinel() {
        let s = Scheduler::new(2, 2).unwrap();
        assert_eq!(s.forward_compute_waited_event(99, 0), -1);
        assert_eq!(s.backward_send_recorded_event(99, 1), -1);
    }
}
