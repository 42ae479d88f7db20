use std::fmt;
use std::sync::Arc;

/// Failure of a cached computation, shared by every caller of the same flight
#[derive(Debug)]
pub enum FlightError<E> {
    /// The producer returned an error
    Producer(Arc<E>),
    /// The producer panicked or its task was cancelled by the runtime
    Aborted(String),
}

impl<E> FlightError<E> {
    /// The producer's own error, if that is what ended the flight
    pub fn producer_error(&self) -> Option<&E> {
        match self {
            Self::Producer(e) => Some(e.as_ref()),
            Self::Aborted(_) => None,
        }
    }
}

impl<E> Clone for FlightError<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Producer(e) => Self::Producer(Arc::clone(e)),
            Self::Aborted(msg) => Self::Aborted(msg.clone()),
        }
    }
}

impl<E: fmt::Display> fmt::Display for FlightError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer(e) => write!(f, "{e}"),
            Self::Aborted(msg) => write!(f, "Computation aborted: {msg}"),
        }
    }
}

impl<E> std::error::Error for FlightError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Producer(e) => Some(e.as_ref()),
            Self::Aborted(_) => None,
        }
    }
}
