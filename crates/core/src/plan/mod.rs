#![forbid(unsafe_code)]

pub mod catalog;
mod columns;
mod policy;

pub use columns::*;
pub use policy::*;

use crate::ids::{MigrationKey, SqlIdent};
use crate::status::Status;
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanError {
    InvalidIdent {
        field: &'static str,
        value: String,
        reason: String,
    },
    InvalidDeclType(String),
    NotNullWithoutDefault(String),
    SelfDependency(String),
    DuplicateColumn(String),
    StatusColumnNotExpected(String),
    InvalidStatusDefault(String),
    ReservedColumn(String),
    DependencyCycle(Vec<String>),
}

impl std::fmt::Display for PlanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdent {
                field,
                value,
                reason,
            } => write!(f, "invalid {field} identifier {value:?}: {reason}"),
            Self::InvalidDeclType(decl) => write!(f, "invalid column type {decl:?}"),
            Self::NotNullWithoutDefault(column) => {
                write!(f, "column {column} is NOT NULL but has no default")
            }
            Self::SelfDependency(column) => write!(f, "column {column} depends on itself"),
            Self::DuplicateColumn(column) => write!(f, "column {column} is declared twice"),
            Self::StatusColumnNotExpected(column) => {
                write!(f, "status column {column} is not among the expected columns")
            }
            Self::InvalidStatusDefault(value) => {
                write!(f, "status column default {value:?} is not a known status")
            }
            Self::ReservedColumn(column) => {
                write!(f, "column {column} is the key or legacy column and cannot be added")
            }
            Self::DependencyCycle(columns) => {
                write!(f, "column dependencies form a cycle: {}", columns.join(", "))
            }
        }
    }
}

impl std::error::Error for PlanError {}

/// Everything the reconciler needs to converge one table onto a status column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationPlan {
    key: MigrationKey,
    table: SqlIdent,
    key_column: SqlIdent,
    legacy_column: SqlIdent,
    status_column: SqlIdent,
    touch_column: Option<SqlIdent>,
    columns: Vec<ColumnSpec>,
    policy: StatusPolicy,
}

impl MigrationPlan {
    /// Starts a plan with the Django conventions: `id`, `is_completed`, `status`, `updated_at`.
    /// The status column still has to be declared with [`MigrationPlanBuilder::with_column`].
    pub fn builder(key: MigrationKey, table: &str) -> Result<MigrationPlanBuilder, PlanError> {
        Ok(MigrationPlanBuilder {
            plan: Self {
                key,
                table: ident("table", table)?,
                key_column: ident("key_column", "id")?,
                legacy_column: ident("legacy_column", "is_completed")?,
                status_column: ident("status_column", "status")?,
                touch_column: Some(ident("touch_column", "updated_at")?),
                columns: Vec::new(),
                policy: StatusPolicy::default(),
            },
        })
    }

    pub fn key(&self) -> &MigrationKey {
        &self.key
    }

    pub fn table(&self) -> &SqlIdent {
        &self.table
    }

    pub fn key_column(&self) -> &SqlIdent {
        &self.key_column
    }

    pub fn legacy_column(&self) -> &SqlIdent {
        &self.legacy_column
    }

    pub fn status_column(&self) -> &SqlIdent {
        &self.status_column
    }

    pub fn touch_column(&self) -> Option<&SqlIdent> {
        self.touch_column.as_ref()
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    pub fn status_column_spec(&self) -> Option<&ColumnSpec> {
        self.columns
            .iter()
            .find(|column| column.name() == &self.status_column)
    }

    /// Status every row holds right after the status column is added; `None` when the
    /// column is nullable without a default and rows start out NULL.
    pub fn status_column_default(&self) -> Option<Status> {
        self.status_column_spec()
            .and_then(|spec| spec.default_value().as_text())
            .and_then(|value| Status::parse(&value))
    }

    /// Orders `missing` so every column comes after the missing columns it depends on.
    /// Dependencies that are not missing impose no ordering. Ties keep declaration order.
    pub fn patch_order(&self, missing: &[SqlIdent]) -> Result<Vec<&ColumnSpec>, PlanError> {
        let pending_names: BTreeSet<&SqlIdent> = missing.iter().collect();
        let mut pending: Vec<&ColumnSpec> = self
            .columns
            .iter()
            .filter(|column| pending_names.contains(column.name()))
            .collect();
        let mut ordered = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            let ready = pending.iter().position(|column| {
                column
                    .dependencies()
                    .iter()
                    .all(|dep| !pending.iter().any(|other| other.name() == dep))
            });
            let Some(index) = ready else {
                return Err(PlanError::DependencyCycle(
                    pending.iter().map(|column| column.name().to_string()).collect(),
                ));
            };
            ordered.push(pending.remove(index));
        }

        Ok(ordered)
    }

    /// Run by [`MigrationPlanBuilder::build`]; plans are valid by construction.
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut seen = BTreeSet::new();
        for column in &self.columns {
            if !seen.insert(column.name()) {
                return Err(PlanError::DuplicateColumn(column.name().to_string()));
            }
            if column.name() == &self.key_column || column.name() == &self.legacy_column {
                return Err(PlanError::ReservedColumn(column.name().to_string()));
            }
        }

        let Some(status) = self.status_column_spec() else {
            return Err(PlanError::StatusColumnNotExpected(
                self.status_column.to_string(),
            ));
        };
        if let Some(value) = status.default_value().as_text()
            && Status::parse(&value).is_none()
        {
            return Err(PlanError::InvalidStatusDefault(value));
        }

        let all: Vec<SqlIdent> = self
            .columns
            .iter()
            .map(|column| column.name().clone())
            .collect();
        self.patch_order(&all)?;
        Ok(())
    }
}

pub struct MigrationPlanBuilder {
    plan: MigrationPlan,
}

impl MigrationPlanBuilder {
    pub fn key_column(mut self, name: &str) -> Result<Self, PlanError> {
        self.plan.key_column = ident("key_column", name)?;
        Ok(self)
    }

    pub fn legacy_column(mut self, name: &str) -> Result<Self, PlanError> {
        self.plan.legacy_column = ident("legacy_column", name)?;
        Ok(self)
    }

    pub fn status_column(mut self, name: &str) -> Result<Self, PlanError> {
        self.plan.status_column = ident("status_column", name)?;
        Ok(self)
    }

    pub fn touch_column(mut self, name: Option<&str>) -> Result<Self, PlanError> {
        self.plan.touch_column = name.map(|name| ident("touch_column", name)).transpose()?;
        Ok(self)
    }

    pub fn policy(mut self, policy: StatusPolicy) -> Self {
        self.plan.policy = policy;
        self
    }

    pub fn with_column(mut self, column: ColumnSpec) -> Self {
        self.plan.columns.push(column);
        self
    }

    pub fn build(self) -> Result<MigrationPlan, PlanError> {
        self.plan.validate()?;
        Ok(self.plan)
    }
}

fn ident(field: &'static str, value: &str) -> Result<SqlIdent, PlanError> {
    SqlIdent::try_new(value).map_err(|err| PlanError::InvalidIdent {
        field,
        value: value.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests;
