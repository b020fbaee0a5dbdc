use std::fmt;

/// Sentinel used for "no upstream"/"unplaced" coordinates.
pub const NONE: i64 = -1;

/// Which sweep of training an [`Action`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Forward,
    Backward,
}

/// What an [`Action`] does on its stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Compute,
    Send,
    Recv,
}

/// One atomic pipeline operation: a compute, send, or receive for a single
/// micro-batch on a single stage.
///
/// `upstream_time`/`upstream_stage` locate the compute [`Action`] (in the
/// compute-only table) that produces this action's input, or [`NONE`] if
/// this action starts a dependency chain. `full_table_time`/`full_table_stage`
/// are stamped in during compute-commute expansion and record where this
/// action's owning compute ended up in the expanded table; they are read
/// back by later expansion steps as a one-time memoization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    pub batch: u32,
    pub kind: ActionKind,
    pub pass: Pass,
    pub upstream_time: i64,
    pub upstream_stage: i64,
    pub this_rank: i64,
    pub peer_rank: i64,
    pub full_table_time: i64,
    pub full_table_stage: i64,
}

impl Action {
    pub(crate) fn compute(batch: u32, pass: Pass, upstream_time: i64, upstream_stage: i64) -> Self {
        Self {
            batch,
            kind: ActionKind::Compute,
            pass,
            upstream_time,
            upstream_stage,
            this_rank: NONE,
            peer_rank: NONE,
            full_table_time: NONE,
            full_table_stage: NONE,
        }
    }

    pub(crate) fn send(
        batch: u32,
        pass: Pass,
        upstream_time: i64,
        upstream_stage: i64,
        this_rank: i64,
        peer_rank: i64,
    ) -> Self {
        Self {
            batch,
            kind: ActionKind::Send,
            pass,
            upstream_time,
            upstream_stage,
            this_rank,
            peer_rank,
            full_table_time: NONE,
            full_table_stage: NONE,
        }
    }

    pub(crate) fn recv(
        batch: u32,
        pass: Pass,
        upstream_time: i64,
        upstream_stage: i64,
        this_rank: i64,
        peer_rank: i64,
    ) -> Self {
        Self {
            batch,
            kind: ActionKind::Recv,
            pass,
            upstream_time,
            upstream_stage,
            this_rank,
            peer_rank,
            full_table_time: NONE,
            full_table_stage: NONE,
        }
    }

    pub fn is_forward(&self) -> bool {
        self.pass == Pass::Forward
    }

    pub fn is_backward(&self) -> bool {
        self.pass == Pass::Backward
    }

    pub fn is_compute(&self) -> bool {
        self.kind == ActionKind::Compute
    }

    /// True if this is a Send whose destination is `dst_stage`.
    pub fn is_send_to(&self, dst_stage: i64) -> bool {
        self.kind == ActionKind::Send && self.peer_rank == dst_stage
    }

    /// True if this is a Recv whose source is `src_stage`.
    pub fn is_recv_from(&self, src_stage: i64) -> bool {
        self.kind == ActionKind::Recv && self.peer_rank == src_stage
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match (self.pass, self.kind) {
            (Pass::Forward, ActionKind::Compute) => "FW",
            (Pass::Forward, ActionKind::Send) => "FS",
            (Pass::Forward, ActionKind::Recv) => "FR",
            (Pass::Backward, ActionKind::Compute) => "BW",
            (Pass::Backward, ActionKind::Send) => "BS",
            (Pass::Backward, ActionKind::Recv) => "BR",
        };
        write!(f, "{token}{:02}", self.batch)
    }
}
