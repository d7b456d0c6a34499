#![forbid(unsafe_code)]

//! Plan file loading. The built-in catalog is always present; a YAML file may add
//! plans or replace built-ins with the same migration key.

use r1d3_core::ids::MigrationKey;
use r1d3_core::{ColumnSpec, DefaultValue, MigrationPlan, PlanError, StatusPolicy, catalog};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("cannot read plan file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("plan file {path} is not valid YAML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("plan {migration}: {reason}")]
    Invalid { migration: String, reason: String },
    #[error("plan {migration}: {source}")]
    Plan {
        migration: String,
        #[source]
        source: PlanError,
    },
    #[error("plan {0} is declared twice")]
    Duplicate(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PlanFile {
    #[serde(default)]
    pub(crate) migrations: Vec<PlanEntry>,
}

fn default_touch_column() -> Option<String> {
    Some("updated_at".to_string())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PlanEntry {
    pub(crate) migration: String,
    pub(crate) table: String,
    #[serde(default)]
    pub(crate) key_column: Option<String>,
    #[serde(default)]
    pub(crate) legacy_column: Option<String>,
    #[serde(default)]
    pub(crate) status_column: Option<String>,
    /// `null` disables touching; absent means `updated_at`.
    #[serde(default = "default_touch_column")]
    pub(crate) touch_column: Option<String>,
    #[serde(default)]
    pub(crate) policy: Option<String>,
    /// Empty means just the status column with its standard definition.
    #[serde(default)]
    pub(crate) columns: Vec<ColumnEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ColumnEntry {
    pub(crate) name: String,
    #[serde(rename = "type")]
    pub(crate) decl_type: String,
    #[serde(default)]
    pub(crate) nullable: bool,
    #[serde(default)]
    pub(crate) default: Option<YamlDefault>,
    #[serde(default)]
    pub(crate) after: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum YamlDefault {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl From<YamlDefault> for DefaultValue {
    fn from(value: YamlDefault) -> Self {
        match value {
            YamlDefault::Bool(value) => DefaultValue::Bool(value),
            YamlDefault::Integer(value) => DefaultValue::Integer(value),
            YamlDefault::Text(value) => DefaultValue::Text(value),
        }
    }
}

impl PlanEntry {
    pub(crate) fn into_plan(self) -> Result<MigrationPlan, ConfigError> {
        let migration = self.migration.clone();
        let invalid = |reason: String| ConfigError::Invalid {
            migration: migration.clone(),
            reason,
        };
        let plan_err = |source: PlanError| ConfigError::Plan {
            migration: migration.clone(),
            source,
        };

        let key = MigrationKey::parse(&self.migration).map_err(|err| invalid(err.to_string()))?;
        let mut builder = MigrationPlan::builder(key, &self.table).map_err(plan_err)?;
        if let Some(column) = &self.key_column {
            builder = builder.key_column(column).map_err(plan_err)?;
        }
        if let Some(column) = &self.legacy_column {
            builder = builder.legacy_column(column).map_err(plan_err)?;
        }
        let status_column = self.status_column.as_deref().unwrap_or("status");
        builder = builder
            .status_column(status_column)
            .map_err(plan_err)?
            .touch_column(self.touch_column.as_deref())
            .map_err(plan_err)?;
        if let Some(policy) = &self.policy {
            let policy = StatusPolicy::parse(policy)
                .ok_or_else(|| invalid(format!("unknown policy {policy:?}")))?;
            builder = builder.policy(policy);
        }

        if self.columns.is_empty() {
            builder = builder.with_column(ColumnSpec::status(status_column).map_err(plan_err)?);
        }
        for column in self.columns {
            let mut spec = ColumnSpec::try_new(
                &column.name,
                &column.decl_type,
                column.nullable,
                column.default.map_or(DefaultValue::Null, Into::into),
            )
            .map_err(plan_err)?;
            for dependency in &column.after {
                spec = spec.after(dependency).map_err(plan_err)?;
            }
            builder = builder.with_column(spec);
        }

        builder.build().map_err(plan_err)
    }
}

pub(crate) fn parse_plan_file(raw: &str, path: &Path) -> Result<Vec<MigrationPlan>, ConfigError> {
    let file: PlanFile = serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut plans: Vec<MigrationPlan> = Vec::with_capacity(file.migrations.len());
    for entry in file.migrations {
        let plan = entry.into_plan()?;
        if plans.iter().any(|seen| seen.key() == plan.key()) {
            return Err(ConfigError::Duplicate(plan.key().to_string()));
        }
        plans.push(plan);
    }
    Ok(plans)
}

/// Built-in plans overlaid with the plan file, if any. File plans replace built-ins
/// in place and otherwise append in file order.
pub(crate) fn load_plans(path: Option<&Path>) -> Result<Vec<MigrationPlan>, ConfigError> {
    let mut plans = catalog::builtin();
    let Some(path) = path else {
        return Ok(plans);
    };

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    for plan in parse_plan_file(&raw, path)? {
        match plans.iter_mut().find(|existing| existing.key() == plan.key()) {
            Some(existing) => *existing = plan,
            None => plans.push(plan),
        }
    }
    tracing::debug!(path = %path.display(), plans = plans.len(), "loaded plan file");
    Ok(plans)
}
