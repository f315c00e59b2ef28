use crate::refcount::Underflow;
use std::fmt::{self, Display};
use std::io;

#[derive(Debug)]
pub enum Error {
    /// A reference was released that was never acquired.
    Underflow(Underflow),
    /// The background worker thread could not be started.
    Spawn(io::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Underflow(e) => e.fmt(f),
            Self::Spawn(e) => write!(f, "failed to spawn worker thread: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Underflow(e) => Some(e),
            Self::Spawn(e) => Some(e),
        }
    }
}

impl From<Underflow> for Error {
    fn from(e: Underflow) -> Self {
        Self::Underflow(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Spawn(e)
    }
}
