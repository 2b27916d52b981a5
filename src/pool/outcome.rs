/// Result of submitting a job to an [`ExecPool`](crate::ExecPool).
///
/// `Cancelled` is not an error: it means the job was abandoned while queued
/// and never ran.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T> {
    /// The job ran and produced a value.
    Done(T),
    /// The job was cancelled before admission.
    Cancelled,
}

impl<T> Outcome<T> {
    /// True for [`Outcome::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// Returns the value, if the job ran.
    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(v) => Some(v),
            Outcome::Cancelled => None,
        }
    }

    /// Maps the value of a completed job.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Done(v) => Outcome::Done(f(v)),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }
}

impl<T, E> Outcome<Result<T, E>> {
    /// Swaps `Outcome<Result<T, E>>` into `Result<Outcome<T>, E>`.
    pub fn transpose(self) -> Result<Outcome<T>, E> {
        match self {
            Outcome::Done(Ok(v)) => Ok(Outcome::Done(v)),
            Outcome::Done(Err(e)) => Err(e),
            Outcome::Cancelled => Ok(Outcome::Cancelled),
        }
    }
}
