use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::role::Role;
use crate::domain::stage::{
    CookingReport, EntryDetails, FailureReason, FinancialTerms, InventoryRecord, LotAllotment,
    LotDecision, LotSelection, ManagerFinancial, OfferReport, QualityParameters, Stage,
};
use crate::domain::status::SampleStatus;

const WORKFLOW_TOML: &str = include_str!("workflow.toml");
const WILDCARD_STATUS: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    EntryDetails,
    QualityParameters,
    LotDecisionPass,
    LotDecisionResample,
    LotDecisionFail,
    CookingReportPassed,
    CookingReportFailed,
    OfferReport,
    LotAllotment,
    InspectionComplete,
    InventoryRecord,
    FinancialTerms,
    PricingBreakdown,
    FailureReason,
}

impl Requirement {
    pub const ALL: [Requirement; 14] = [
        Requirement::EntryDetails,
        Requirement::QualityParameters,
        Requirement::LotDecisionPass,
        Requirement::LotDecisionResample,
        Requirement::LotDecisionFail,
        Requirement::CookingReportPassed,
        Requirement::CookingReportFailed,
        Requirement::OfferReport,
        Requirement::LotAllotment,
        Requirement::InspectionComplete,
        Requirement::InventoryRecord,
        Requirement::FinancialTerms,
        Requirement::PricingBreakdown,
        Requirement::FailureReason,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Requirement::EntryDetails => "entry_details",
            Requirement::QualityParameters => "quality_parameters",
            Requirement::LotDecisionPass => "lot_decision_pass",
            Requirement::LotDecisionResample => "lot_decision_resample",
            Requirement::LotDecisionFail => "lot_decision_fail",
            Requirement::CookingReportPassed => "cooking_report_passed",
            Requirement::CookingReportFailed => "cooking_report_failed",
            Requirement::OfferReport => "offer_report",
            Requirement::LotAllotment => "lot_allotment",
            Requirement::InspectionComplete => "inspection_complete",
            Requirement::InventoryRecord => "inventory_record",
            Requirement::FinancialTerms => "financial_terms",
            Requirement::PricingBreakdown => "pricing_breakdown",
            Requirement::FailureReason => "failure_reason",
        }
    }

    pub fn is_met(self, snapshot: &StageSnapshot) -> bool {
        let decision = snapshot.lot_selection.as_ref().map(|lot| lot.decision);
        match self {
            Requirement::EntryDetails => snapshot.entry.is_some(),
            Requirement::QualityParameters => snapshot.quality.is_some(),
            Requirement::LotDecisionPass => decision == Some(LotDecision::Pass),
            Requirement::LotDecisionResample => decision == Some(LotDecision::Resample),
            Requirement::LotDecisionFail => decision == Some(LotDecision::Fail),
            Requirement::CookingReportPassed => {
                snapshot.cooking.as_ref().is_some_and(CookingReport::passed)
            }
            Requirement::CookingReportFailed => snapshot
                .cooking
                .as_ref()
                .is_some_and(|report| !report.passed()),
            Requirement::OfferReport => snapshot.offer.is_some(),
            Requirement::LotAllotment => snapshot.allotment.is_some(),
            Requirement::InspectionComplete => snapshot
                .allotment
                .as_ref()
                .is_some_and(|allotment| snapshot.inspected_bags >= allotment.bags),
            Requirement::InventoryRecord => snapshot.inventory.is_some(),
            Requirement::FinancialTerms => snapshot.financial_terms.is_some(),
            Requirement::PricingBreakdown => snapshot.manager_financial.is_some(),
            Requirement::FailureReason => snapshot.failure_reason.is_some(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Requirement {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Requirement::ALL
            .into_iter()
            .find(|requirement| requirement.as_str() == normalized)
            .ok_or_else(|| {
                WorkflowError::InvalidDefinition(format!("unknown requirement '{}'", value))
            })
    }
}

/// Read-only view of an entry's recorded stage data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageSnapshot {
    pub entry: Option<EntryDetails>,
    pub quality: Option<QualityParameters>,
    pub lot_selection: Option<LotSelection>,
    pub cooking: Option<CookingReport>,
    pub offer: Option<OfferReport>,
    pub allotment: Option<LotAllotment>,
    pub inspected_bags: u32,
    pub inventory: Option<InventoryRecord>,
    pub financial_terms: Option<FinancialTerms>,
    pub manager_financial: Option<ManagerFinancial>,
    pub failure_reason: Option<FailureReason>,
}

/// Where a rule may be taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FromStatus {
    Exact(SampleStatus),
    AnyActive,
}

impl FromStatus {
    fn matches(self, status: SampleStatus) -> bool {
        match self {
            FromStatus::Exact(expected) => expected == status,
            FromStatus::AnyActive => !status.is_terminal(),
        }
    }
}

impl fmt::Display for FromStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FromStatus::Exact(status) => write!(f, "{status}"),
            FromStatus::AnyActive => f.write_str(WILDCARD_STATUS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRule {
    pub from: FromStatus,
    pub to: SampleStatus,
    pub roles: Vec<Role>,
    pub requires: Vec<Requirement>,
}

impl TransitionRule {
    fn unmet(&self, snapshot: &StageSnapshot) -> Option<Requirement> {
        self.requires
            .iter()
            .copied()
            .find(|requirement| !requirement.is_met(snapshot))
    }
}

#[derive(Debug, Deserialize)]
struct RawWorkflowFile {
    #[serde(default)]
    transitions: Vec<RawTransition>,
}

#[derive(Debug, Deserialize)]
struct RawTransition {
    from: String,
    to: String,
    roles: Vec<String>,
    #[serde(default)]
    requires: Vec<String>,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid workflow TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(String),
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: SampleStatus,
        to: SampleStatus,
    },
    #[error("role '{role}' may not move {from} -> {to} (allowed: {allowed})")]
    Unauthorized {
        role: Role,
        from: SampleStatus,
        to: SampleStatus,
        allowed: String,
    },
    #[error("cannot move to {status}: {requirement} has not been recorded")]
    MissingStageData {
        status: SampleStatus,
        requirement: Requirement,
    },
}

#[derive(Debug, Clone)]
pub struct WorkflowTable {
    rules: Vec<TransitionRule>,
}

impl WorkflowTable {
    pub fn load() -> Result<Self, WorkflowError> {
        Self::from_toml(WORKFLOW_TOML)
    }

    pub fn from_toml(raw: &str) -> Result<Self, WorkflowError> {
        let file: RawWorkflowFile = toml::from_str(raw)?;
        if file.transitions.is_empty() {
            return Err(WorkflowError::InvalidDefinition(
                "at least one transition must be defined".to_string(),
            ));
        }

        let mut rules = Vec::with_capacity(file.transitions.len());
        let mut seen = HashSet::new();
        for raw_rule in file.transitions {
            let rule = normalize_rule(raw_rule)?;
            if !seen.insert((rule.from, rule.to)) {
                return Err(WorkflowError::InvalidDefinition(format!(
                    "duplicate transition {} -> {}",
                    rule.from, rule.to
                )));
            }
            rules.push(rule);
        }

        let table = Self { rules };
        if !table.reaches(SampleStatus::INITIAL, SampleStatus::Completed) {
            return Err(WorkflowError::InvalidDefinition(format!(
                "no path from {} to {}",
                SampleStatus::INITIAL,
                SampleStatus::Completed
            )));
        }
        Ok(table)
    }

    pub fn rules(&self) -> &[TransitionRule] {
        &self.rules
    }

    pub fn allowed_from(&self, status: SampleStatus) -> Vec<&TransitionRule> {
        self.rules
            .iter()
            .filter(|rule| rule.from.matches(status))
            .collect()
    }

    /// Existence, then role, then recorded stage data. When several rules
    /// cover the same move (an exact row and the `*` row), any one that the
    /// actor may take and whose requirements hold is enough.
    pub fn check(
        &self,
        from: SampleStatus,
        to: SampleStatus,
        role: Role,
        snapshot: &StageSnapshot,
    ) -> Result<&TransitionRule, WorkflowError> {
        let candidates = self
            .rules
            .iter()
            .filter(|rule| rule.to == to && rule.from.matches(from))
            .collect::<Vec<_>>();
        if from == to || candidates.is_empty() {
            return Err(WorkflowError::InvalidTransition { from, to });
        }

        let authorized = candidates
            .iter()
            .copied()
            .filter(|rule| role.satisfies(&rule.roles))
            .collect::<Vec<_>>();
        if authorized.is_empty() {
            return Err(WorkflowError::Unauthorized {
                role,
                from,
                to,
                allowed: allowed_roles(&candidates),
            });
        }

        let mut first_unmet = None;
        for rule in authorized {
            match rule.unmet(snapshot) {
                None => return Ok(rule),
                Some(requirement) => {
                    first_unmet.get_or_insert(requirement);
                }
            }
        }
        Err(WorkflowError::MissingStageData {
            status: to,
            requirement: first_unmet.unwrap_or(Requirement::EntryDetails),
        })
    }

    /// Whether `role` may record data for `stage`: the same roles that may
    /// move the entry out of the stage's status.
    pub fn may_record(&self, stage: Stage, role: Role) -> bool {
        let from = match stage.owning_status() {
            Some(status) => FromStatus::Exact(status),
            None => FromStatus::AnyActive,
        };
        self.rules
            .iter()
            .filter(|rule| rule.from == from)
            .any(|rule| role.satisfies(&rule.roles))
    }

    /// Statuses `role` can move an entry out of, excluding the catch-all
    /// failure row.
    pub fn actionable_for(&self, role: Role) -> Vec<SampleStatus> {
        let mut statuses = self
            .rules
            .iter()
            .filter(|rule| role.satisfies(&rule.roles))
            .filter_map(|rule| match rule.from {
                FromStatus::Exact(status) => Some(status),
                FromStatus::AnyActive => None,
            })
            .collect::<Vec<_>>();
        statuses.sort();
        statuses.dedup();
        statuses
    }

    pub fn render(&self) -> String {
        let width = self
            .rules
            .iter()
            .map(|rule| rule.from.to_string().len() + rule.to.as_str().len() + 4)
            .max()
            .unwrap_or(0);
        let mut out = String::new();
        for rule in &self.rules {
            let arrow = format!("{} -> {}", rule.from, rule.to);
            let roles = rule
                .roles
                .iter()
                .map(|role| role.as_str())
                .collect::<Vec<_>>()
                .join(",");
            let requires = rule
                .requires
                .iter()
                .map(|requirement| requirement.as_str())
                .collect::<Vec<_>>()
                .join(",");
            out.push_str(&format!("{arrow:<width$}  [{roles}]  requires: {requires}\n"));
        }
        out
    }

    fn reaches(&self, start: SampleStatus, goal: SampleStatus) -> bool {
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(status) = queue.pop_front() {
            if status == goal {
                return true;
            }
            for rule in self.allowed_from(status) {
                if seen.insert(rule.to) {
                    queue.push_back(rule.to);
                }
            }
        }
        false
    }
}

fn allowed_roles(rules: &[&TransitionRule]) -> String {
    let mut roles = rules
        .iter()
        .flat_map(|rule| rule.roles.iter().copied())
        .chain(std::iter::once(Role::Admin))
        .collect::<Vec<_>>();
    roles.sort();
    roles.dedup();
    roles
        .iter()
        .map(|role| role.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_status(raw: &str) -> Result<SampleStatus, WorkflowError> {
    SampleStatus::from_str(raw).map_err(|err| WorkflowError::InvalidDefinition(err.to_string()))
}

fn normalize_rule(raw: RawTransition) -> Result<TransitionRule, WorkflowError> {
    let from = if raw.from.trim() == WILDCARD_STATUS {
        FromStatus::AnyActive
    } else {
        FromStatus::Exact(parse_status(&raw.from)?)
    };
    let to = parse_status(&raw.to)?;

    if let FromStatus::Exact(status) = from {
        if status.is_terminal() {
            return Err(WorkflowError::InvalidDefinition(format!(
                "terminal status {} cannot have outgoing transitions",
                status
            )));
        }
        if status == to {
            return Err(WorkflowError::InvalidDefinition(format!(
                "transition {} -> {} does not change status",
                status, to
            )));
        }
    }

    if raw.roles.is_empty() {
        return Err(WorkflowError::InvalidDefinition(format!(
            "transition {} -> {} lists no roles",
            from, to
        )));
    }
    let roles = raw
        .roles
        .iter()
        .map(|value| {
            Role::from_str(value).map_err(|err| WorkflowError::InvalidDefinition(err.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let requires = raw
        .requires
        .iter()
        .map(|value| Requirement::from_str(value))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TransitionRule {
        from,
        to,
        roles,
        requires,
    })
}

#[cfg(test)]
mod tests;
