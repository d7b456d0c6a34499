#![forbid(unsafe_code)]

//! Status migrations known to the R1D3 schema.

use super::{ColumnSpec, DefaultValue, MigrationPlan, PlanError, StatusPolicy};
use crate::ids::MigrationKey;

pub const STRATEGY_MILESTONE_STATUS: &str = "strategy.add_status";
pub const GAME_MILESTONE_STATUS: &str = "projects.add_gamemilestone_status";
pub const STRATEGY_PHASE_STATUS: &str = "strategy.add_phase_status";

pub fn builtin() -> Vec<MigrationPlan> {
    // Literal identifiers only; `builtin_catalog_is_complete` pins the count.
    [
        strategy_milestone_status(),
        game_milestone_status(),
        strategy_phase_status(),
    ]
    .into_iter()
    .filter_map(Result::ok)
    .collect()
}

pub fn find<'a>(plans: &'a [MigrationPlan], key: &MigrationKey) -> Option<&'a MigrationPlan> {
    plans.iter().find(|plan| plan.key() == key)
}

pub fn strategy_milestone_status() -> Result<MigrationPlan, PlanError> {
    MigrationPlan::builder(key(STRATEGY_MILESTONE_STATUS)?, "strategy_strategymilestone")?
        .with_column(ColumnSpec::status("status")?)
        .build()
}

pub fn game_milestone_status() -> Result<MigrationPlan, PlanError> {
    MigrationPlan::builder(key(GAME_MILESTONE_STATUS)?, "projects_gamemilestone")?
        .with_column(ColumnSpec::status("status")?)
        .build()
}

/// Phases gained `is_current` and `status` together; status is added last.
pub fn strategy_phase_status() -> Result<MigrationPlan, PlanError> {
    MigrationPlan::builder(key(STRATEGY_PHASE_STATUS)?, "strategy_strategyphase")?
        .policy(StatusPolicy::FalseNotStarted)
        .with_column(ColumnSpec::status("status")?.after("is_current")?)
        .with_column(ColumnSpec::try_new(
            "is_current",
            "bool",
            false,
            DefaultValue::Bool(false),
        )?)
        .build()
}

fn key(value: &str) -> Result<MigrationKey, PlanError> {
    MigrationKey::parse(value).map_err(|err| PlanError::InvalidIdent {
        field: "migration",
        value: value.to_string(),
        reason: err.to_string(),
    })
}
