use super::{FromStatus, Requirement, StageSnapshot, WorkflowError, WorkflowTable};
use crate::domain::role::Role;
use crate::domain::stage::{
    CookingReport, CookingStatus, FailureReason, LotAllotment, LotDecision, LotSelection, Stage,
};
use crate::domain::status::SampleStatus;

fn table() -> WorkflowTable {
    WorkflowTable::load().expect("embedded workflow should load")
}

fn lot_decision(decision: LotDecision) -> StageSnapshot {
    StageSnapshot {
        lot_selection: Some(LotSelection {
            decision,
            remarks: None,
        }),
        ..StageSnapshot::default()
    }
}

#[test]
fn embedded_table_covers_every_non_terminal_status() {
    let table = table();
    for status in SampleStatus::ALL {
        let exact = table
            .rules()
            .iter()
            .any(|rule| rule.from == FromStatus::Exact(status));
        assert_eq!(exact, !status.is_terminal(), "status {status}");
    }
}

#[test]
fn terminal_statuses_have_no_way_out() {
    let table = table();
    for terminal in [SampleStatus::Completed, SampleStatus::Failed] {
        assert!(table.allowed_from(terminal).is_empty());
        let err = table
            .check(
                terminal,
                SampleStatus::QualityCheck,
                Role::Admin,
                &StageSnapshot::default(),
            )
            .expect_err("terminal status should not move");
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
    }
}

#[test]
fn rejects_skipping_stages_even_for_admin() {
    let err = table()
        .check(
            SampleStatus::StaffEntry,
            SampleStatus::LotSelection,
            Role::Admin,
            &StageSnapshot::default(),
        )
        .expect_err("skip should fail");
    assert_eq!(
        err.to_string(),
        "invalid status transition: staff_entry -> lot_selection"
    );
}

#[test]
fn same_status_is_not_a_transition() {
    let err = table()
        .check(
            SampleStatus::QualityCheck,
            SampleStatus::QualityCheck,
            Role::Admin,
            &StageSnapshot::default(),
        )
        .expect_err("self transition should fail");
    assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
}

#[test]
fn role_is_checked_before_stage_data() {
    let err = table()
        .check(
            SampleStatus::OwnerFinancial,
            SampleStatus::ManagerFinancial,
            Role::Manager,
            &StageSnapshot::default(),
        )
        .expect_err("manager cannot set owner rates");
    match err {
        WorkflowError::Unauthorized { role, allowed, .. } => {
            assert_eq!(role, Role::Manager);
            assert_eq!(allowed, "owner, admin");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_stage_data_names_the_requirement() {
    let err = table()
        .check(
            SampleStatus::QualityCheck,
            SampleStatus::LotSelection,
            Role::QualitySupervisor,
            &StageSnapshot::default(),
        )
        .expect_err("quality data missing");
    assert!(matches!(
        err,
        WorkflowError::MissingStageData {
            status: SampleStatus::LotSelection,
            requirement: Requirement::QualityParameters,
        }
    ));
    assert!(err.to_string().contains("quality_parameters"));
}

#[test]
fn lot_decision_selects_the_branch() {
    let table = table();
    let pass = lot_decision(LotDecision::Pass);
    assert!(table
        .check(
            SampleStatus::LotSelection,
            SampleStatus::CookingReport,
            Role::Owner,
            &pass
        )
        .is_ok());
    assert!(table
        .check(
            SampleStatus::LotSelection,
            SampleStatus::QualityCheck,
            Role::Owner,
            &pass
        )
        .is_err());

    let resample = lot_decision(LotDecision::Resample);
    assert!(table
        .check(
            SampleStatus::LotSelection,
            SampleStatus::QualityCheck,
            Role::Manager,
            &resample
        )
        .is_ok());
}

#[test]
fn failure_accepts_either_fail_decision_or_reason() {
    let table = table();
    let by_decision = table
        .check(
            SampleStatus::LotSelection,
            SampleStatus::Failed,
            Role::Manager,
            &lot_decision(LotDecision::Fail),
        )
        .expect("fail decision should allow failure");
    assert_eq!(
        by_decision.from,
        FromStatus::Exact(SampleStatus::LotSelection)
    );

    let with_reason = StageSnapshot {
        failure_reason: Some(FailureReason {
            reason: "moisture above 17%".to_string(),
        }),
        ..StageSnapshot::default()
    };
    let by_reason = table
        .check(
            SampleStatus::InventoryEntry,
            SampleStatus::Failed,
            Role::Owner,
            &with_reason,
        )
        .expect("reason should allow failure from any active status");
    assert_eq!(by_reason.from, FromStatus::AnyActive);

    let err = table
        .check(
            SampleStatus::InventoryEntry,
            SampleStatus::Failed,
            Role::Owner,
            &StageSnapshot::default(),
        )
        .expect_err("failure without reason should be rejected");
    assert!(matches!(
        err,
        WorkflowError::MissingStageData {
            requirement: Requirement::FailureReason,
            ..
        }
    ));
}

#[test]
fn cooking_medium_counts_as_pass() {
    let snapshot = StageSnapshot {
        cooking: Some(CookingReport {
            status: CookingStatus::Medium,
            remarks: None,
        }),
        ..StageSnapshot::default()
    };
    assert!(Requirement::CookingReportPassed.is_met(&snapshot));
    assert!(!Requirement::CookingReportFailed.is_met(&snapshot));
}

#[test]
fn inspection_completes_only_when_allotted_bags_are_inspected() {
    let mut snapshot = StageSnapshot {
        allotment: Some(LotAllotment {
            supervisor: "suresh".to_string(),
            bags: 400,
        }),
        inspected_bags: 250,
        ..StageSnapshot::default()
    };
    assert!(!Requirement::InspectionComplete.is_met(&snapshot));
    snapshot.inspected_bags = 400;
    assert!(Requirement::InspectionComplete.is_met(&snapshot));
}

#[test]
fn queue_lists_statuses_a_role_can_act_on() {
    let table = table();
    assert_eq!(
        table.actionable_for(Role::PhysicalSupervisor),
        vec![SampleStatus::PhysicalInspection]
    );
    assert_eq!(
        table.actionable_for(Role::Owner),
        vec![
            SampleStatus::LotSelection,
            SampleStatus::FinalReport,
            SampleStatus::OwnerFinancial,
            SampleStatus::FinalReview,
        ]
    );
    let admin = table.actionable_for(Role::Admin);
    assert_eq!(admin.len(), 11);
}

#[test]
fn recording_permissions_follow_outgoing_rows() {
    let table = table();
    assert!(table.may_record(Stage::QualityParameters, Role::QualitySupervisor));
    assert!(!table.may_record(Stage::QualityParameters, Role::Staff));
    assert!(table.may_record(Stage::FinancialTerms, Role::Owner));
    assert!(!table.may_record(Stage::FinancialTerms, Role::Manager));
    assert!(table.may_record(Stage::FailureReason, Role::Manager));
    assert!(!table.may_record(Stage::FailureReason, Role::Staff));
    assert!(table.may_record(Stage::Inspection, Role::Admin));
}

#[test]
fn rejects_malformed_tables() {
    let unknown_role = r#"
[[transitions]]
from = "staff_entry"
to = "completed"
roles = ["broker"]
"#;
    assert!(matches!(
        WorkflowTable::from_toml(unknown_role),
        Err(WorkflowError::InvalidDefinition(_))
    ));

    let from_terminal = r#"
[[transitions]]
from = "staff_entry"
to = "completed"
roles = ["owner"]

[[transitions]]
from = "completed"
to = "staff_entry"
roles = ["owner"]
"#;
    let err = WorkflowTable::from_toml(from_terminal).expect_err("terminal exit should fail");
    assert!(err.to_string().contains("terminal status completed"));

    let duplicate = r#"
[[transitions]]
from = "staff_entry"
to = "completed"
roles = ["owner"]

[[transitions]]
from = "staff_entry"
to = "completed"
roles = ["manager"]
"#;
    let err = WorkflowTable::from_toml(duplicate).expect_err("duplicate should fail");
    assert!(err.to_string().contains("duplicate transition"));

    let unreachable = r#"
[[transitions]]
from = "staff_entry"
to = "failed"
roles = ["owner"]
"#;
    let err = WorkflowTable::from_toml(unreachable).expect_err("no completion path");
    assert!(err.to_string().contains("no path"));

    assert!(matches!(
        WorkflowTable::from_toml("transitions = 3"),
        Err(WorkflowError::Toml(_))
    ));
}

#[test]
fn renders_one_line_per_rule() {
    let table = table();
    let rendered = table.render();
    assert_eq!(rendered.lines().count(), table.rules().len());
    assert!(rendered.contains("owner_financial -> manager_financial"));
    assert!(rendered.contains("* -> failed"));
}
