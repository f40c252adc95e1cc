use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::status::SampleStatus;
use crate::domain::units::{Money, Percent, Weight};
use crate::pricing::PricingBreakdown;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
    #[error("{field} must be between 0 and 100 (got {value})")]
    PercentOutOfRange { field: &'static str, value: Percent },
    #[error("{field} cannot be negative")]
    Negative { field: &'static str },
    #[error("tare weight {tare} must be below gross weight {gross}")]
    TareExceedsGross { gross: Weight, tare: Weight },
    #[error("{field} {value} exceeds {limit}")]
    ExceedsLimit {
        field: &'static str,
        value: u32,
        limit: u32,
    },
    #[error("invalid {field} '{value}': expected one of {expected}")]
    UnknownChoice {
        field: &'static str,
        value: String,
        expected: String,
    },
}

macro_rules! choice_enum {
    ($name:ident, $field:expr, { $($variant:ident => $text:expr),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
                $name::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str() == normalized)
                    .ok_or_else(|| ValidationError::UnknownChoice {
                        field: $field,
                        value: value.to_string(),
                        expected: $name::ALL
                            .iter()
                            .map(|candidate| candidate.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }
    };
}

choice_enum!(LotDecision, "lot decision", {
    Pass => "pass",
    Resample => "resample",
    Fail => "fail",
});

choice_enum!(CookingStatus, "cooking status", {
    Pass => "pass",
    Medium => "medium",
    Fail => "fail",
});

choice_enum!(RateBasis, "rate basis", {
    PerQuintal => "per_quintal",
    PerBag => "per_bag",
});

choice_enum!(SuteBasis, "sute basis", {
    PerTon => "per_ton",
    PerBag => "per_bag",
});

choice_enum!(Stage, "stage", {
    EntryDetails => "entry_details",
    QualityParameters => "quality_parameters",
    LotSelection => "lot_selection",
    CookingReport => "cooking_report",
    OfferReport => "offer_report",
    LotAllotment => "lot_allotment",
    Inspection => "inspection",
    InventoryRecord => "inventory_record",
    FinancialTerms => "financial_terms",
    ManagerFinancial => "manager_financial",
    FailureReason => "failure_reason",
});

impl Stage {
    /// Status an entry must be in for this stage's data to be recorded.
    /// `None` means any non-terminal status.
    pub fn owning_status(self) -> Option<SampleStatus> {
        match self {
            Stage::EntryDetails => Some(SampleStatus::StaffEntry),
            Stage::QualityParameters => Some(SampleStatus::QualityCheck),
            Stage::LotSelection => Some(SampleStatus::LotSelection),
            Stage::CookingReport => Some(SampleStatus::CookingReport),
            Stage::OfferReport => Some(SampleStatus::FinalReport),
            Stage::LotAllotment => Some(SampleStatus::LotAllotment),
            Stage::Inspection => Some(SampleStatus::PhysicalInspection),
            Stage::InventoryRecord => Some(SampleStatus::InventoryEntry),
            Stage::FinancialTerms => Some(SampleStatus::OwnerFinancial),
            Stage::ManagerFinancial => Some(SampleStatus::ManagerFinancial),
            Stage::FailureReason => None,
        }
    }
}

fn required_text(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn positive_count(value: u32, field: &'static str) -> Result<u32, ValidationError> {
    if value == 0 {
        return Err(ValidationError::NotPositive { field });
    }
    Ok(value)
}

fn non_negative_money(value: Money, field: &'static str) -> Result<Money, ValidationError> {
    if value.raw() < 0 {
        return Err(ValidationError::Negative { field });
    }
    Ok(value)
}

fn bounded_percent(value: Percent, field: &'static str) -> Result<Percent, ValidationError> {
    if !value.within_hundred() {
        return Err(ValidationError::PercentOutOfRange { field, value });
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDetails {
    pub party_name: String,
    #[serde(default)]
    pub broker_name: Option<String>,
    pub variety: String,
    pub location: String,
    pub bags: u32,
    #[serde(default)]
    pub collected_by: Option<String>,
    #[serde(default)]
    pub lorry_number: Option<String>,
}

impl EntryDetails {
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            party_name: required_text(&self.party_name, "party name")?,
            broker_name: optional_text(self.broker_name),
            variety: required_text(&self.variety, "variety")?,
            location: required_text(&self.location, "location")?,
            bags: positive_count(self.bags, "bags")?,
            collected_by: optional_text(self.collected_by),
            lorry_number: optional_text(self.lorry_number),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityParameters {
    pub moisture: Percent,
    pub cutting: Percent,
    pub bend: Percent,
    pub mix: Percent,
    pub sk: Percent,
    pub grains_count: u32,
    #[serde(default)]
    pub wb_present: bool,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl QualityParameters {
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            moisture: bounded_percent(self.moisture, "moisture")?,
            cutting: bounded_percent(self.cutting, "cutting")?,
            bend: bounded_percent(self.bend, "bend")?,
            mix: bounded_percent(self.mix, "mix")?,
            sk: bounded_percent(self.sk, "sk")?,
            grains_count: positive_count(self.grains_count, "grains count")?,
            wb_present: self.wb_present,
            remarks: optional_text(self.remarks),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotSelection {
    pub decision: LotDecision,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl LotSelection {
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            decision: self.decision,
            remarks: optional_text(self.remarks),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookingReport {
    pub status: CookingStatus,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl CookingReport {
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            status: self.status,
            remarks: optional_text(self.remarks),
        })
    }

    pub fn passed(&self) -> bool {
        matches!(self.status, CookingStatus::Pass | CookingStatus::Medium)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferReport {
    pub base_rate: Money,
    pub basis: RateBasis,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl OfferReport {
    pub fn validated(self) -> Result<Self, ValidationError> {
        if !self.base_rate.is_positive() {
            return Err(ValidationError::NotPositive {
                field: "offered base rate",
            });
        }
        Ok(Self {
            base_rate: self.base_rate,
            basis: self.basis,
            remarks: optional_text(self.remarks),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotAllotment {
    pub supervisor: String,
    pub bags: u32,
}

impl LotAllotment {
    pub fn validated(self, entry_bags: u32) -> Result<Self, ValidationError> {
        let bags = positive_count(self.bags, "allotted bags")?;
        if bags > entry_bags {
            return Err(ValidationError::ExceedsLimit {
                field: "allotted bags",
                value: bags,
                limit: entry_bags,
            });
        }
        Ok(Self {
            supervisor: required_text(&self.supervisor, "supervisor")?,
            bags,
        })
    }
}

/// One arrival inspected by the physical supervisor. An allotted lot may
/// arrive over several lorries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalInspection {
    pub bags: u32,
    #[serde(default)]
    pub lorry_number: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl PhysicalInspection {
    pub fn validated(self, already_inspected: u32, allotted: u32) -> Result<Self, ValidationError> {
        let bags = positive_count(self.bags, "inspected bags")?;
        let cumulative = already_inspected.saturating_add(bags);
        if cumulative > allotted {
            return Err(ValidationError::ExceedsLimit {
                field: "cumulative inspected bags",
                value: cumulative,
                limit: allotted,
            });
        }
        Ok(Self {
            bags,
            lorry_number: optional_text(self.lorry_number),
            remarks: optional_text(self.remarks),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub gross_weight: Weight,
    pub tare_weight: Weight,
    pub bags_received: u32,
    pub storage_location: String,
    #[serde(default)]
    pub variety: Option<String>,
}

impl InventoryRecord {
    pub fn validated(self) -> Result<Self, ValidationError> {
        if self.tare_weight.raw() < 0 {
            return Err(ValidationError::Negative {
                field: "tare weight",
            });
        }
        if self.tare_weight >= self.gross_weight {
            return Err(ValidationError::TareExceedsGross {
                gross: self.gross_weight,
                tare: self.tare_weight,
            });
        }
        Ok(Self {
            gross_weight: self.gross_weight,
            tare_weight: self.tare_weight,
            bags_received: positive_count(self.bags_received, "bags received")?,
            storage_location: required_text(&self.storage_location, "storage location")?,
            variety: optional_text(self.variety),
        })
    }

    pub fn net_weight(&self) -> Weight {
        Weight(self.gross_weight.raw() - self.tare_weight.raw())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialTerms {
    pub base_rate: Money,
    pub base_basis: RateBasis,
    /// Kilograms deducted per ton of net weight or per bag.
    pub sute_rate: Weight,
    pub sute_basis: SuteBasis,
    pub brokerage_rate: Money,
    pub brokerage_basis: RateBasis,
    pub egb_rate: Money,
    pub lf_rate: Money,
    pub hamali_rate: Money,
}

impl FinancialTerms {
    pub fn validated(self) -> Result<Self, ValidationError> {
        if !self.base_rate.is_positive() {
            return Err(ValidationError::NotPositive { field: "base rate" });
        }
        if self.sute_rate.raw() < 0 {
            return Err(ValidationError::Negative { field: "sute rate" });
        }
        Ok(Self {
            base_rate: self.base_rate,
            base_basis: self.base_basis,
            sute_rate: self.sute_rate,
            sute_basis: self.sute_basis,
            brokerage_rate: non_negative_money(self.brokerage_rate, "brokerage rate")?,
            brokerage_basis: self.brokerage_basis,
            egb_rate: non_negative_money(self.egb_rate, "egb rate")?,
            lf_rate: non_negative_money(self.lf_rate, "lf rate")?,
            hamali_rate: non_negative_money(self.hamali_rate, "hamali rate")?,
        })
    }
}

/// Manager-stage overrides applied on top of the owner's terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerAdjustments {
    #[serde(default)]
    pub egb_rate: Option<Money>,
    #[serde(default)]
    pub lf_rate: Option<Money>,
    #[serde(default)]
    pub hamali_rate: Option<Money>,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl ManagerAdjustments {
    pub fn validated(self) -> Result<Self, ValidationError> {
        let check = |value: Option<Money>, field| value.map(|rate| non_negative_money(rate, field));
        Ok(Self {
            egb_rate: check(self.egb_rate, "egb rate").transpose()?,
            lf_rate: check(self.lf_rate, "lf rate").transpose()?,
            hamali_rate: check(self.hamali_rate, "hamali rate").transpose()?,
            remarks: optional_text(self.remarks),
        })
    }

    pub fn apply(&self, terms: &FinancialTerms) -> FinancialTerms {
        FinancialTerms {
            egb_rate: self.egb_rate.unwrap_or(terms.egb_rate),
            lf_rate: self.lf_rate.unwrap_or(terms.lf_rate),
            hamali_rate: self.hamali_rate.unwrap_or(terms.hamali_rate),
            ..terms.clone()
        }
    }
}

/// What the manager stage stores: the overrides plus the calculation they
/// produced, frozen so later rate edits cannot change a signed-off purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerFinancial {
    pub adjustments: ManagerAdjustments,
    pub terms: FinancialTerms,
    pub breakdown: PricingBreakdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub reason: String,
}

impl FailureReason {
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            reason: required_text(&self.reason, "failure reason")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> EntryDetails {
        EntryDetails {
            party_name: "  Sri Lakshmi Traders ".to_string(),
            broker_name: Some("   ".to_string()),
            variety: "Sona Masuri".to_string(),
            location: "Miryalaguda".to_string(),
            bags: 400,
            collected_by: None,
            lorry_number: Some("AP29 T 4411".to_string()),
        }
    }

    #[test]
    fn entry_details_trims_and_drops_blank_optionals() {
        let validated = entry().validated().expect("entry should validate");
        assert_eq!(validated.party_name, "Sri Lakshmi Traders");
        assert_eq!(validated.broker_name, None);
        assert_eq!(validated.lorry_number.as_deref(), Some("AP29 T 4411"));
    }

    #[test]
    fn entry_details_require_party_and_bags() {
        let mut missing_party = entry();
        missing_party.party_name = " ".to_string();
        assert_eq!(
            missing_party.validated(),
            Err(ValidationError::Required("party name"))
        );

        let mut no_bags = entry();
        no_bags.bags = 0;
        assert!(matches!(
            no_bags.validated(),
            Err(ValidationError::NotPositive { field: "bags" })
        ));
    }

    #[test]
    fn quality_percentages_are_bounded() {
        let params = QualityParameters {
            moisture: Percent(1_650),
            cutting: Percent(10_100),
            bend: Percent(0),
            mix: Percent(0),
            sk: Percent(0),
            grains_count: 120,
            wb_present: false,
            remarks: None,
        };
        assert!(matches!(
            params.validated(),
            Err(ValidationError::PercentOutOfRange {
                field: "cutting",
                ..
            })
        ));
    }

    #[test]
    fn allotment_cannot_exceed_entry_bags() {
        let allotment = LotAllotment {
            supervisor: "suresh".to_string(),
            bags: 401,
        };
        assert!(matches!(
            allotment.validated(400),
            Err(ValidationError::ExceedsLimit { limit: 400, .. })
        ));
    }

    #[test]
    fn inspections_cannot_overshoot_allotment() {
        let inspection = PhysicalInspection {
            bags: 150,
            lorry_number: None,
            remarks: None,
        };
        assert!(inspection.clone().validated(200, 400).is_ok());
        assert!(matches!(
            inspection.validated(300, 400),
            Err(ValidationError::ExceedsLimit { value: 450, .. })
        ));
    }

    #[test]
    fn inventory_net_weight_requires_tare_below_gross() {
        let record = InventoryRecord {
            gross_weight: Weight::from_kg(32_000),
            tare_weight: Weight::from_kg(12_000),
            bags_received: 400,
            storage_location: "Godown 3".to_string(),
            variety: None,
        }
        .validated()
        .expect("record should validate");
        assert_eq!(record.net_weight(), Weight::from_kg(20_000));

        let inverted = InventoryRecord {
            tare_weight: Weight::from_kg(40_000),
            ..record
        };
        assert!(matches!(
            inverted.validated(),
            Err(ValidationError::TareExceedsGross { .. })
        ));
    }

    #[test]
    fn manager_adjustments_override_only_given_rates() {
        let terms = FinancialTerms {
            base_rate: Money::from_rupees(2_100),
            base_basis: RateBasis::PerQuintal,
            sute_rate: Weight::from_kg(1),
            sute_basis: SuteBasis::PerTon,
            brokerage_rate: Money::from_rupees(10),
            brokerage_basis: RateBasis::PerQuintal,
            egb_rate: Money::from_rupees(15),
            lf_rate: Money::from_rupees(5),
            hamali_rate: Money::from_rupees(4),
        };
        let adjustments = ManagerAdjustments {
            hamali_rate: Some(Money::from_rupees(6)),
            ..ManagerAdjustments::default()
        };
        let applied = adjustments.apply(&terms);
        assert_eq!(applied.hamali_rate, Money::from_rupees(6));
        assert_eq!(applied.lf_rate, terms.lf_rate);
        assert_eq!(applied.base_rate, terms.base_rate);
    }

    #[test]
    fn choices_parse_case_insensitively() {
        assert_eq!("RESAMPLE".parse::<LotDecision>().unwrap(), LotDecision::Resample);
        assert_eq!("per-bag".parse::<RateBasis>().unwrap(), RateBasis::PerBag);
        let err = "maybe".parse::<CookingStatus>().expect_err("unknown choice");
        assert!(err.to_string().contains("pass, medium, fail"));
    }

    #[test]
    fn stage_ownership_matches_workflow_statuses() {
        assert_eq!(
            Stage::QualityParameters.owning_status(),
            Some(SampleStatus::QualityCheck)
        );
        assert_eq!(
            Stage::OfferReport.owning_status(),
            Some(SampleStatus::FinalReport)
        );
        assert_eq!(Stage::FailureReason.owning_status(), None);
    }
}
