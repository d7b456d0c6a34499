#![forbid(unsafe_code)]

use super::PlanError;
use crate::ids::SqlIdent;
use crate::status::Status;

/// Explicit default carried by every added column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DefaultValue {
    Null,
    Integer(i64),
    Bool(bool),
    Text(String),
}

impl DefaultValue {
    pub fn sql_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Integer(value) => value.to_string(),
            Self::Bool(value) => if *value { "1" } else { "0" }.to_string(),
            Self::Text(value) => format!("'{}'", value.replace('\'', "''")),
        }
    }

    /// The value existing rows observe right after `ADD COLUMN`, rendered as text.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Integer(value) => Some(value.to_string()),
            Self::Bool(value) => Some(if *value { "1" } else { "0" }.to_string()),
            Self::Text(value) => Some(value.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSpec {
    name: SqlIdent,
    decl_type: String,
    nullable: bool,
    default: DefaultValue,
    after: Vec<SqlIdent>,
}

impl ColumnSpec {
    pub fn try_new(
        name: &str,
        decl_type: &str,
        nullable: bool,
        default: DefaultValue,
    ) -> Result<Self, PlanError> {
        let name = SqlIdent::try_new(name).map_err(|err| PlanError::InvalidIdent {
            field: "column",
            value: name.to_string(),
            reason: err.to_string(),
        })?;
        let decl_type = decl_type.trim();
        if decl_type.is_empty()
            || !decl_type
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, ' ' | '_' | '(' | ')' | ','))
        {
            return Err(PlanError::InvalidDeclType(decl_type.to_string()));
        }
        if !nullable && default == DefaultValue::Null {
            return Err(PlanError::NotNullWithoutDefault(name.to_string()));
        }
        Ok(Self {
            name,
            decl_type: decl_type.to_string(),
            nullable,
            default,
            after: Vec::new(),
        })
    }

    /// `varchar(20) NOT NULL DEFAULT 'not_started'`, the shape Django emits for a status field.
    pub fn status(name: &str) -> Result<Self, PlanError> {
        Self::try_new(
            name,
            "varchar(20)",
            false,
            DefaultValue::Text(Status::NotStarted.as_str().to_string()),
        )
    }

    pub fn after(mut self, dependency: &str) -> Result<Self, PlanError> {
        let dependency = SqlIdent::try_new(dependency).map_err(|err| PlanError::InvalidIdent {
            field: "after",
            value: dependency.to_string(),
            reason: err.to_string(),
        })?;
        if dependency == self.name {
            return Err(PlanError::SelfDependency(self.name.to_string()));
        }
        if !self.after.contains(&dependency) {
            self.after.push(dependency);
        }
        Ok(self)
    }

    pub fn name(&self) -> &SqlIdent {
        &self.name
    }

    pub fn decl_type(&self) -> &str {
        &self.decl_type
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn default_value(&self) -> &DefaultValue {
        &self.default
    }

    pub fn dependencies(&self) -> &[SqlIdent] {
        &self.after
    }

    /// Column definition for `ALTER TABLE .. ADD COLUMN`.
    pub fn column_definition(&self) -> String {
        let mut out = format!("{} {}", self.name.quoted(), self.decl_type);
        if !self.nullable {
            out.push_str(" NOT NULL");
        }
        out.push_str(" DEFAULT ");
        out.push_str(&self.default.sql_literal());
        out
    }
}
