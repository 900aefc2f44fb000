use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// Correlation token for one pending host operation.
///
/// The same id is handed to the host when a hook is registered and comes back
/// with every delivery for that hook. Tasks are futures too, so a task's id
/// lives in the same namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FutureId(Uuid);

impl FutureId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn value(self) -> Uuid {
        self.0
    }
}

impl Default for FutureId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FutureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FutureId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}
