//! Permission sets attached to an identity.

use std::collections::BTreeSet;

/// Grants everything.
pub const WILDCARD: &str = "*";

/// Named permissions held by a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions {
    names: BTreeSet<String>,
}

impl Permissions {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// True if every required permission is held, or the wildcard is.
    pub fn allows(&self, required: &[&str]) -> bool {
        self.names.contains(WILDCARD) || required.iter().all(|r| self.names.contains(*r))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
