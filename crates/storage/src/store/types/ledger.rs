#![forbid(unsafe_code)]

/// A row of the migration ledger. Inserted once, never updated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationRecord {
    pub id: i64,
    pub app: String,
    pub name: String,
    pub applied: String,
}

impl MigrationRecord {
    pub fn label(&self) -> String {
        format!("{}.{}", self.app, self.name)
    }
}
