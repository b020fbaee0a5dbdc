/// Errors from the scheduler constructor.
///
/// Every other failure mode described in the scheduler's design (an
/// exhausted placement search, a malformed action) is an internal
/// invariant violation rather than bad input, and panics instead of
/// returning one of these.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("zero stages")]
    ZeroStages,
    #[error("zero batches")]
    ZeroBatches,
}
