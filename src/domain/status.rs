use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SampleStatus {
    StaffEntry,
    QualityCheck,
    LotSelection,
    CookingReport,
    FinalReport,
    LotAllotment,
    PhysicalInspection,
    InventoryEntry,
    OwnerFinancial,
    ManagerFinancial,
    FinalReview,
    Completed,
    Failed,
}

impl SampleStatus {
    pub const ALL: [SampleStatus; 13] = [
        SampleStatus::StaffEntry,
        SampleStatus::QualityCheck,
        SampleStatus::LotSelection,
        SampleStatus::CookingReport,
        SampleStatus::FinalReport,
        SampleStatus::LotAllotment,
        SampleStatus::PhysicalInspection,
        SampleStatus::InventoryEntry,
        SampleStatus::OwnerFinancial,
        SampleStatus::ManagerFinancial,
        SampleStatus::FinalReview,
        SampleStatus::Completed,
        SampleStatus::Failed,
    ];

    pub const INITIAL: SampleStatus = SampleStatus::StaffEntry;

    pub fn as_str(self) -> &'static str {
        match self {
            SampleStatus::StaffEntry => "staff_entry",
            SampleStatus::QualityCheck => "quality_check",
            SampleStatus::LotSelection => "lot_selection",
            SampleStatus::CookingReport => "cooking_report",
            SampleStatus::FinalReport => "final_report",
            SampleStatus::LotAllotment => "lot_allotment",
            SampleStatus::PhysicalInspection => "physical_inspection",
            SampleStatus::InventoryEntry => "inventory_entry",
            SampleStatus::OwnerFinancial => "owner_financial",
            SampleStatus::ManagerFinancial => "manager_financial",
            SampleStatus::FinalReview => "final_review",
            SampleStatus::Completed => "completed",
            SampleStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SampleStatus::Completed | SampleStatus::Failed)
    }

    /// Next status on the main path. Branching stages (lot selection, cooking)
    /// report their pass target; the recorded decision may pick another.
    pub fn happy_path_next(self) -> Option<SampleStatus> {
        let next = match self {
            SampleStatus::StaffEntry => SampleStatus::QualityCheck,
            SampleStatus::QualityCheck => SampleStatus::LotSelection,
            SampleStatus::LotSelection => SampleStatus::CookingReport,
            SampleStatus::CookingReport => SampleStatus::FinalReport,
            SampleStatus::FinalReport => SampleStatus::LotAllotment,
            SampleStatus::LotAllotment => SampleStatus::PhysicalInspection,
            SampleStatus::PhysicalInspection => SampleStatus::InventoryEntry,
            SampleStatus::InventoryEntry => SampleStatus::OwnerFinancial,
            SampleStatus::OwnerFinancial => SampleStatus::ManagerFinancial,
            SampleStatus::ManagerFinancial => SampleStatus::FinalReview,
            SampleStatus::FinalReview => SampleStatus::Completed,
            SampleStatus::Completed | SampleStatus::Failed => return None,
        };
        Some(next)
    }
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleStatus {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        SampleStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| ParseStatusError {
                value: value.to_string(),
            })
    }
}

impl Serialize for SampleStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SampleStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SampleStatus::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid sample status '{value}': expected one of {}", expected_statuses())]
pub struct ParseStatusError {
    value: String,
}

fn expected_statuses() -> String {
    SampleStatus::ALL
        .iter()
        .map(|status| status.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::SampleStatus;
    use std::str::FromStr;

    #[test]
    fn parses_canonical_and_screaming_case_names() {
        assert_eq!(
            SampleStatus::from_str("staff_entry").unwrap(),
            SampleStatus::StaffEntry
        );
        assert_eq!(
            SampleStatus::from_str("QUALITY_CHECK").unwrap(),
            SampleStatus::QualityCheck
        );
        assert_eq!(
            SampleStatus::from_str(" lot-allotment ").unwrap(),
            SampleStatus::LotAllotment
        );
    }

    #[test]
    fn parse_error_lists_valid_statuses() {
        let err = SampleStatus::from_str("shipped").expect_err("unknown status should fail");
        let message = err.to_string();
        assert!(message.contains("'shipped'"));
        assert!(message.contains("physical_inspection"));
        assert!(message.contains("failed"));
    }

    #[test]
    fn happy_path_visits_every_non_failed_status_once() {
        let mut visited = vec![SampleStatus::INITIAL];
        let mut current = SampleStatus::INITIAL;
        while let Some(next) = current.happy_path_next() {
            visited.push(next);
            current = next;
        }
        assert_eq!(current, SampleStatus::Completed);
        assert_eq!(visited.len(), SampleStatus::ALL.len() - 1);
        assert!(!visited.contains(&SampleStatus::Failed));
    }

    #[test]
    fn marks_only_completed_and_failed_as_terminal() {
        let terminal = SampleStatus::ALL
            .into_iter()
            .filter(|status| status.is_terminal())
            .collect::<Vec<_>>();
        assert_eq!(terminal, vec![SampleStatus::Completed, SampleStatus::Failed]);
    }

    #[test]
    fn serde_uses_canonical_strings() {
        let raw = serde_json::to_string(&SampleStatus::OwnerFinancial).unwrap();
        assert_eq!(raw, "\"owner_financial\"");
        let parsed: SampleStatus = serde_json::from_str("\"FINAL_REVIEW\"").unwrap();
        assert_eq!(parsed, SampleStatus::FinalReview);
    }
}
