//! Named SQL statements prepared on every pooled connection.

/// A statement a plugin needs prepared before it can serve requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedStatement {
    pub name: &'static str,
    pub sql: &'static str,
}

impl PreparedStatement {
    pub const fn new(name: &'static str, sql: &'static str) -> Self {
        Self { name, sql }
    }
}

/// Conflicting definitions for one statement name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("statement '{name}' declared twice with different SQL")]
pub struct StatementConflict {
    pub name: &'static str,
}

/// Ordered, name-unique collection of statements.
#[derive(Debug, Clone, Default)]
pub struct StatementSet {
    statements: Vec<PreparedStatement>,
}

impl StatementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add statements, skipping exact duplicates. Two plugins may share a
    /// statement as long as they agree on its SQL.
    pub fn extend(&mut self, statements: &[PreparedStatement]) -> Result<(), StatementConflict> {
        for stmt in statements {
            match self.statements.iter().find(|s| s.name == stmt.name) {
                Some(existing) if existing.sql == stmt.sql => {}
                Some(_) => return Err(StatementConflict { name: stmt.name }),
                None => self.statements.push(*stmt),
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PreparedStatement> {
        self.statements.iter()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}
