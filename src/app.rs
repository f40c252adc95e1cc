use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::{Connection, Transaction};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::audit::{self, AuditIssue, AuditReport, ChainLink, TransitionRecord, GENESIS_HASH};
use crate::config::{ConfigError, MillConfig};
use crate::db::{self, EntryRecord, InspectionRow, LedgerRow, StageRecordRow, TransitionRow};
use crate::domain::role::{Actor, EmptyActorError, ParseRoleError, Role};
use crate::domain::stage::{
    CookingReport, EntryDetails, FailureReason, FinancialTerms, InventoryRecord, LotAllotment,
    LotDecision, LotSelection, ManagerAdjustments, ManagerFinancial, OfferReport,
    PhysicalInspection, QualityParameters, Stage, ValidationError,
};
use crate::domain::status::{ParseStatusError, SampleStatus};
use crate::domain::units::{Money, UnitParseError, Weight};
use crate::events::{
    new_event_id, now_utc_rfc3339, relative_path_for_event, EventKind, EventWriteError,
    EventWriter, JournalEvent,
};
use crate::pricing::{self, PricingBreakdown, PricingError, PricingInput};
use crate::workflow::{StageSnapshot, WorkflowError, WorkflowTable};

pub struct App {
    conn: Connection,
    writer: EventWriter,
    workflow: WorkflowTable,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SampleEntryView {
    pub id: String,
    pub party_name: String,
    pub variety: String,
    pub location: String,
    pub bags: u32,
    pub status: String,
    pub terminal: bool,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
    pub etag: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InspectionView {
    pub id: String,
    pub bags: u32,
    pub lorry_number: Option<String>,
    pub remarks: Option<String>,
    pub inspected_by: String,
    pub inspected_at: String,
}

/// Everything known about one entry: the summary row, recorded stage data,
/// inspection trips, the statuses the table allows next and, once completed,
/// the posted purchase.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EntryDetailView {
    #[serde(flatten)]
    pub entry: SampleEntryView,
    pub stages: StageSnapshot,
    pub inspections: Vec<InspectionView>,
    pub next: Vec<String>,
    pub purchase: Option<LedgerView>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LedgerView {
    pub id: String,
    pub entry_id: String,
    pub party_name: String,
    pub broker_name: Option<String>,
    pub variety: String,
    pub bags: u32,
    pub net_weight: Weight,
    pub billable_weight: Weight,
    pub base_amount: Money,
    pub brokerage_amount: Money,
    pub egb_amount: Money,
    pub lf_amount: Money,
    pub hamali_amount: Money,
    pub party_payable: Money,
    pub broker_payable: Money,
    pub total_purchase_cost: Money,
    pub average_rate_per_quintal: Money,
    pub posted_by: String,
    pub posted_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub status: Option<SampleStatus>,
    pub party: Option<String>,
    pub include_terminal: bool,
}

impl App {
    pub fn open(db_path: &str, root: PathBuf, config: &MillConfig) -> Result<Self, AppError> {
        ensure_parent_dir(db_path)?;
        let workflow = match config.workflow_path(&root) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading workflow table");
                WorkflowTable::from_toml(&std::fs::read_to_string(&path)?)?
            }
            None => WorkflowTable::load()?,
        };
        let conn = db::open_connection(db_path)?;
        Ok(Self {
            conn,
            writer: EventWriter::new(root),
            workflow,
        })
    }

    pub fn workflow(&self) -> &WorkflowTable {
        &self.workflow
    }

    pub fn create_entry(
        &self,
        actor: &Actor,
        details: EntryDetails,
    ) -> Result<SampleEntryView, AppError> {
        if !self.workflow.may_record(Stage::EntryDetails, actor.role) {
            return Err(self.not_permitted(actor, Stage::EntryDetails));
        }
        let details = details.validated()?;

        let id = format!("S-{}", Uuid::now_v7());
        let occurred_at = now_utc_rfc3339();
        let status = SampleStatus::INITIAL;
        let record = EntryRecord {
            id: id.clone(),
            party_name: details.party_name.clone(),
            variety: details.variety.clone(),
            location: details.location.clone(),
            bags: details.bags,
            status: status.as_str().to_string(),
            created_by: actor.user.clone(),
            created_at: occurred_at.clone(),
            updated_at: occurred_at.clone(),
            etag: new_event_id(),
        };
        let data = serde_json::to_value(&details)?;
        let row = chained_row(
            &id,
            None,
            status,
            actor,
            None,
            &occurred_at,
            GENESIS_HASH.to_string(),
        );

        let tx = self.conn.unchecked_transaction()?;
        db::insert_entry(&tx, &record)?;
        db::upsert_stage(
            &tx,
            &stage_row(&id, Stage::EntryDetails, &data, actor, &occurred_at),
        )?;
        db::append_transition(&tx, &row)?;
        let created = JournalEvent::with_identity(
            row.event_id.clone(),
            occurred_at.clone(),
            id.clone(),
            EventKind::EntryCreated,
            actor_pair(actor),
            json!({
                "to": status,
                "details": data,
                "prev_hash": row.prev_hash,
                "hash": row.hash,
            }),
        );
        self.commit_journaled(tx, &[created])?;

        tracing::info!(
            entry = %id,
            party = %record.party_name,
            user = %actor.user,
            role = %actor.role,
            "sample entry created"
        );
        Ok(SampleEntryView::from(record))
    }

    pub fn record_quality(
        &self,
        id: &str,
        actor: &Actor,
        quality: QualityParameters,
    ) -> Result<SampleEntryView, AppError> {
        self.record_stage(id, actor, Stage::QualityParameters, |_, _| {
            Ok(quality.validated()?)
        })
    }

    pub fn record_lot_selection(
        &self,
        id: &str,
        actor: &Actor,
        selection: LotSelection,
    ) -> Result<SampleEntryView, AppError> {
        self.record_stage(id, actor, Stage::LotSelection, |_, _| {
            Ok(selection.validated()?)
        })
    }

    pub fn record_cooking_report(
        &self,
        id: &str,
        actor: &Actor,
        report: CookingReport,
    ) -> Result<SampleEntryView, AppError> {
        self.record_stage(id, actor, Stage::CookingReport, |_, _| {
            Ok(report.validated()?)
        })
    }

    pub fn record_offer(
        &self,
        id: &str,
        actor: &Actor,
        offer: OfferReport,
    ) -> Result<SampleEntryView, AppError> {
        self.record_stage(id, actor, Stage::OfferReport, |_, _| Ok(offer.validated()?))
    }

    pub fn allot_lot(
        &self,
        id: &str,
        actor: &Actor,
        allotment: LotAllotment,
    ) -> Result<SampleEntryView, AppError> {
        self.record_stage(id, actor, Stage::LotAllotment, |entry, _| {
            Ok(allotment.validated(entry.bags)?)
        })
    }

    /// Inspection trips accumulate; each one is its own row and the entry
    /// can move on once the allotted bag count has been inspected.
    pub fn add_inspection(
        &self,
        id: &str,
        actor: &Actor,
        inspection: PhysicalInspection,
    ) -> Result<SampleEntryView, AppError> {
        let entry = self.require_entry(id)?;
        self.ensure_recordable(&entry, actor, Stage::Inspection)?;
        let snapshot = self.snapshot(id)?;
        let allotted = snapshot
            .allotment
            .as_ref()
            .map(|allotment| allotment.bags)
            .ok_or(AppError::MissingStage(Stage::LotAllotment))?;
        let inspection = inspection.validated(snapshot.inspected_bags, allotted)?;
        let inspected_total = snapshot.inspected_bags + inspection.bags;

        let occurred_at = now_utc_rfc3339();
        let row = InspectionRow {
            id: format!("I-{}", Uuid::now_v7()),
            entry_id: id.to_string(),
            bags: inspection.bags,
            lorry_number: inspection.lorry_number,
            remarks: inspection.remarks,
            inspected_by: actor.user.clone(),
            inspected_at: occurred_at.clone(),
        };

        let tx = self.conn.unchecked_transaction()?;
        claim_entry(&tx, &entry, &occurred_at)?;
        db::insert_inspection(&tx, &row)?;
        let added = JournalEvent::with_identity(
            new_event_id(),
            occurred_at.clone(),
            id,
            EventKind::InspectionAdded,
            actor_pair(actor),
            json!({
                "inspection_id": row.id,
                "bags": row.bags,
                "lorry_number": row.lorry_number,
                "remarks": row.remarks,
                "inspected_total": inspected_total,
                "allotted": allotted,
            }),
        );
        self.commit_journaled(tx, &[added])?;

        tracing::info!(
            entry = id,
            bags = row.bags,
            inspected_total,
            allotted,
            "inspection recorded"
        );
        self.view(id)
    }

    pub fn record_inventory(
        &self,
        id: &str,
        actor: &Actor,
        inventory: InventoryRecord,
    ) -> Result<SampleEntryView, AppError> {
        self.record_stage(id, actor, Stage::InventoryRecord, |_, _| {
            Ok(inventory.validated()?)
        })
    }

    pub fn record_financial_terms(
        &self,
        id: &str,
        actor: &Actor,
        terms: FinancialTerms,
    ) -> Result<SampleEntryView, AppError> {
        self.record_stage(id, actor, Stage::FinancialTerms, |_, _| {
            Ok(terms.validated()?)
        })
    }

    /// Applies the manager's overrides to the owner's terms and freezes the
    /// resulting calculation alongside them.
    pub fn record_manager_adjustments(
        &self,
        id: &str,
        actor: &Actor,
        adjustments: ManagerAdjustments,
    ) -> Result<SampleEntryView, AppError> {
        self.record_stage(id, actor, Stage::ManagerFinancial, |_, snapshot| {
            let adjustments = adjustments.validated()?;
            let inventory = snapshot
                .inventory
                .as_ref()
                .ok_or(AppError::MissingStage(Stage::InventoryRecord))?;
            let owner_terms = snapshot
                .financial_terms
                .as_ref()
                .ok_or(AppError::MissingStage(Stage::FinancialTerms))?;
            let terms = adjustments.apply(owner_terms);
            let breakdown = pricing::calculate(&PricingInput {
                net_weight: inventory.net_weight(),
                bags: inventory.bags_received,
                terms: &terms,
            })?;
            Ok(ManagerFinancial {
                adjustments,
                terms,
                breakdown,
            })
        })
    }

    pub fn record_failure_reason(
        &self,
        id: &str,
        actor: &Actor,
        reason: FailureReason,
    ) -> Result<SampleEntryView, AppError> {
        self.record_stage(id, actor, Stage::FailureReason, |_, _| {
            Ok(reason.validated()?)
        })
    }

    pub fn transition(
        &self,
        id: &str,
        to: SampleStatus,
        actor: &Actor,
        remark: Option<&str>,
        if_match: Option<&str>,
    ) -> Result<SampleEntryView, AppError> {
        let entry = self.require_entry(id)?;
        if let Some(expected) = if_match.map(str::trim) {
            if expected != entry.etag {
                return Err(AppError::PreconditionFailed {
                    id: id.to_string(),
                    expected: expected.to_string(),
                    actual: entry.etag,
                });
            }
        }

        let from = SampleStatus::from_str(&entry.status)?;
        let snapshot = self.snapshot(id)?;
        if let Err(err) = self.workflow.check(from, to, actor.role, &snapshot) {
            tracing::warn!(
                entry = id,
                %from,
                %to,
                user = %actor.user,
                role = %actor.role,
                error = %err,
                "transition denied"
            );
            return Err(err.into());
        }

        let remark = remark.map(str::trim).filter(|remark| !remark.is_empty());
        let occurred_at = now_utc_rfc3339();
        let prev_hash = db::last_transition(&self.conn, id)?
            .map(|row| row.hash)
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let row = chained_row(id, Some(from), to, actor, remark, &occurred_at, prev_hash);

        let tx = self.conn.unchecked_transaction()?;
        let applied = db::update_entry_status(
            &tx,
            id,
            &entry.etag,
            to.as_str(),
            &occurred_at,
            &new_event_id(),
        )?;
        if !applied {
            return Err(stale_etag(&tx, &entry)?);
        }
        db::append_transition(&tx, &row)?;

        let cleared = if is_backward(from, to) {
            clear_reentered(&tx, id, from, to)?
        } else {
            0
        };
        let ledger = if to == SampleStatus::Completed {
            Some(post_ledger(&tx, &entry, &snapshot, actor, &occurred_at)?)
        } else {
            None
        };

        let mut events = vec![JournalEvent::with_identity(
            row.event_id.clone(),
            occurred_at.clone(),
            id,
            EventKind::StatusChanged,
            actor_pair(actor),
            json!({
                "from": from,
                "to": to,
                "remark": remark,
                "cleared_stages": cleared,
                "prev_hash": row.prev_hash,
                "hash": row.hash,
            }),
        )];
        if let Some(ledger) = ledger {
            events.push(JournalEvent::with_identity(
                new_event_id(),
                occurred_at.clone(),
                id,
                EventKind::LedgerPosted,
                actor_pair(actor),
                serde_json::to_value(LedgerView::from(ledger))?,
            ));
        }
        self.commit_journaled(tx, &events)?;

        tracing::info!(
            entry = id,
            %from,
            %to,
            user = %actor.user,
            role = %actor.role,
            cleared,
            "status changed"
        );
        self.view(id)
    }

    /// Moves along the main path, letting a recorded lot decision or a failed
    /// cooking report choose the branch.
    pub fn advance(
        &self,
        id: &str,
        actor: &Actor,
        remark: Option<&str>,
        if_match: Option<&str>,
    ) -> Result<SampleEntryView, AppError> {
        let entry = self.require_entry(id)?;
        let from = SampleStatus::from_str(&entry.status)?;
        let snapshot = self.snapshot(id)?;
        let to = next_status(from, &snapshot).ok_or_else(|| AppError::EntryClosed {
            id: id.to_string(),
            status: from,
        })?;
        self.transition(id, to, actor, remark, if_match)
    }

    pub fn show(&self, id: &str) -> Result<Option<EntryDetailView>, AppError> {
        let Some(entry) = db::get_entry(&self.conn, id)? else {
            return Ok(None);
        };
        let status = SampleStatus::from_str(&entry.status)?;
        let stages = self.snapshot(id)?;
        let inspections = db::list_inspections(&self.conn, id)?
            .into_iter()
            .map(InspectionView::from)
            .collect();
        let mut next = self
            .workflow
            .allowed_from(status)
            .into_iter()
            .map(|rule| rule.to)
            .collect::<Vec<_>>();
        next.sort();
        next.dedup();

        Ok(Some(EntryDetailView {
            entry: SampleEntryView::from(entry),
            stages,
            inspections,
            next: next.iter().map(|status| status.as_str().to_string()).collect(),
            purchase: db::get_ledger_for_entry(&self.conn, id)?.map(LedgerView::from),
        }))
    }

    pub fn list(&self, filter: &EntryFilter) -> Result<Vec<SampleEntryView>, AppError> {
        let party = filter
            .party
            .as_deref()
            .map(|party| party.trim().to_lowercase())
            .filter(|party| !party.is_empty());

        let mut entries = Vec::new();
        for record in db::list_entries(&self.conn)? {
            let status = SampleStatus::from_str(&record.status)?;
            let keep_status = match filter.status {
                Some(wanted) => status == wanted,
                None => filter.include_terminal || !status.is_terminal(),
            };
            if !keep_status {
                continue;
            }
            if let Some(needle) = &party {
                if !record.party_name.to_lowercase().contains(needle) {
                    continue;
                }
            }
            entries.push(SampleEntryView::from(record));
        }
        Ok(entries)
    }

    /// Entries waiting on `role`, oldest activity first.
    pub fn queue(&self, role: Role) -> Result<Vec<SampleEntryView>, AppError> {
        let statuses = self.workflow.actionable_for(role);
        let mut queue = Vec::new();
        for record in db::list_entries(&self.conn)? {
            if statuses.contains(&SampleStatus::from_str(&record.status)?) {
                queue.push(SampleEntryView::from(record));
            }
        }
        queue.sort_by(|left, right| {
            left.updated_at
                .cmp(&right.updated_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(queue)
    }

    pub fn history(&self, id: &str) -> Result<Vec<TransitionRecord>, AppError> {
        self.require_entry(id)?;
        Ok(db::list_transitions(&self.conn, id)?
            .into_iter()
            .map(TransitionRecord::from)
            .collect())
    }

    /// Re-derives the hash chain and checks every record has its journal
    /// file with the same hash.
    pub fn verify(&self, id: &str) -> Result<AuditReport, AppError> {
        let entry = self.require_entry(id)?;
        let rows = db::list_transitions(&self.conn, id)?;
        let mut issues = audit::verify_chain(&rows, &entry.status);
        for row in &rows {
            if !self.journal_matches(row) {
                issues.push(AuditIssue::MissingJournal {
                    seq: row.seq,
                    event_id: row.event_id.clone(),
                });
            }
        }
        if !issues.is_empty() {
            tracing::warn!(entry = id, issues = issues.len(), "audit chain has issues");
        }
        Ok(AuditReport {
            entry_id: id.to_string(),
            records: rows.len(),
            issues,
        })
    }

    pub fn ledger(&self) -> Result<Vec<LedgerView>, AppError> {
        Ok(db::list_ledger(&self.conn)?
            .into_iter()
            .map(LedgerView::from)
            .collect())
    }

    /// The frozen manager calculation once it exists, otherwise a preview from
    /// the owner's terms and the inventory weights.
    pub fn quote(&self, id: &str) -> Result<PricingBreakdown, AppError> {
        self.require_entry(id)?;
        let snapshot = self.snapshot(id)?;
        if let Some(frozen) = snapshot.manager_financial {
            return Ok(frozen.breakdown);
        }
        let inventory = snapshot
            .inventory
            .as_ref()
            .ok_or(AppError::MissingStage(Stage::InventoryRecord))?;
        let terms = snapshot
            .financial_terms
            .as_ref()
            .ok_or(AppError::MissingStage(Stage::FinancialTerms))?;
        Ok(pricing::calculate(&PricingInput {
            net_weight: inventory.net_weight(),
            bags: inventory.bags_received,
            terms,
        })?)
    }

    fn record_stage<T, F>(
        &self,
        id: &str,
        actor: &Actor,
        stage: Stage,
        build: F,
    ) -> Result<SampleEntryView, AppError>
    where
        T: Serialize,
        F: FnOnce(&EntryRecord, &StageSnapshot) -> Result<T, AppError>,
    {
        let entry = self.require_entry(id)?;
        let status = self.ensure_recordable(&entry, actor, stage)?;
        let snapshot = self.snapshot(id)?;
        let data = serde_json::to_value(build(&entry, &snapshot)?)?;

        let occurred_at = now_utc_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        claim_entry(&tx, &entry, &occurred_at)?;
        db::upsert_stage(&tx, &stage_row(id, stage, &data, actor, &occurred_at))?;
        let recorded = JournalEvent::with_identity(
            new_event_id(),
            occurred_at,
            id,
            EventKind::StageRecorded,
            actor_pair(actor),
            json!({
                "stage": stage,
                "status": status,
                "data": data,
            }),
        );
        self.commit_journaled(tx, &[recorded])?;

        tracing::info!(
            entry = id,
            %stage,
            %status,
            user = %actor.user,
            role = %actor.role,
            "stage recorded"
        );
        self.view(id)
    }

    /// Writes the journal events for a change, then commits it. If any write
    /// or the commit fails, the files already written are removed and the
    /// transaction rolls back on drop.
    fn commit_journaled(
        &self,
        tx: Transaction<'_>,
        events: &[JournalEvent],
    ) -> Result<(), AppError> {
        let mut written = Vec::with_capacity(events.len());
        for event in events {
            match self.writer.write(event) {
                Ok(path) => written.push(path),
                Err(err) => {
                    self.writer.discard(&written);
                    return Err(err.into());
                }
            }
        }
        if let Err(err) = tx.commit() {
            self.writer.discard(&written);
            return Err(err.into());
        }
        Ok(())
    }

    fn ensure_recordable(
        &self,
        entry: &EntryRecord,
        actor: &Actor,
        stage: Stage,
    ) -> Result<SampleStatus, AppError> {
        let status = SampleStatus::from_str(&entry.status)?;
        if status.is_terminal() {
            return Err(AppError::EntryClosed {
                id: entry.id.clone(),
                status,
            });
        }
        if let Some(expected) = stage.owning_status() {
            if expected != status {
                return Err(AppError::WrongStage {
                    stage,
                    expected,
                    actual: status,
                });
            }
        }
        if !self.workflow.may_record(stage, actor.role) {
            return Err(self.not_permitted(actor, stage));
        }
        Ok(status)
    }

    fn not_permitted(&self, actor: &Actor, stage: Stage) -> AppError {
        tracing::warn!(
            %stage,
            user = %actor.user,
            role = %actor.role,
            "stage recording denied"
        );
        AppError::NotPermitted {
            role: actor.role,
            stage,
        }
    }

    fn snapshot(&self, id: &str) -> Result<StageSnapshot, AppError> {
        let mut snapshot = StageSnapshot::default();
        for row in db::list_stages(&self.conn, id)? {
            let raw = row.data_json.as_str();
            match Stage::from_str(&row.stage)? {
                Stage::EntryDetails => snapshot.entry = Some(serde_json::from_str(raw)?),
                Stage::QualityParameters => snapshot.quality = Some(serde_json::from_str(raw)?),
                Stage::LotSelection => snapshot.lot_selection = Some(serde_json::from_str(raw)?),
                Stage::CookingReport => snapshot.cooking = Some(serde_json::from_str(raw)?),
                Stage::OfferReport => snapshot.offer = Some(serde_json::from_str(raw)?),
                Stage::LotAllotment => snapshot.allotment = Some(serde_json::from_str(raw)?),
                Stage::InventoryRecord => snapshot.inventory = Some(serde_json::from_str(raw)?),
                Stage::FinancialTerms => {
                    snapshot.financial_terms = Some(serde_json::from_str(raw)?)
                }
                Stage::ManagerFinancial => {
                    snapshot.manager_financial = Some(serde_json::from_str(raw)?)
                }
                Stage::FailureReason => snapshot.failure_reason = Some(serde_json::from_str(raw)?),
                // Inspection trips live in their own table.
                Stage::Inspection => {}
            }
        }
        snapshot.inspected_bags = db::list_inspections(&self.conn, id)?
            .iter()
            .map(|row| row.bags)
            .sum();
        Ok(snapshot)
    }

    fn journal_matches(&self, row: &TransitionRow) -> bool {
        let kind = if row.from_status.is_none() {
            EventKind::EntryCreated
        } else {
            EventKind::StatusChanged
        };
        let Ok(path) = relative_path_for_event(&row.occurred_at, &row.event_id, kind.as_str())
        else {
            return false;
        };
        match self.writer.read(&path) {
            Ok(event) => event.data.get("hash").and_then(Value::as_str) == Some(row.hash.as_str()),
            Err(_) => false,
        }
    }

    fn require_entry(&self, id: &str) -> Result<EntryRecord, AppError> {
        db::get_entry(&self.conn, id)?.ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    fn view(&self, id: &str) -> Result<SampleEntryView, AppError> {
        self.require_entry(id).map(SampleEntryView::from)
    }
}

/// Target of `advance` from `from`, or `None` once the entry is closed.
pub(crate) fn next_status(from: SampleStatus, snapshot: &StageSnapshot) -> Option<SampleStatus> {
    match from {
        SampleStatus::LotSelection => match snapshot.lot_selection.as_ref().map(|lot| lot.decision)
        {
            Some(LotDecision::Resample) => Some(SampleStatus::QualityCheck),
            Some(LotDecision::Fail) => Some(SampleStatus::Failed),
            _ => from.happy_path_next(),
        },
        SampleStatus::CookingReport => match &snapshot.cooking {
            Some(report) if !report.passed() => Some(SampleStatus::Failed),
            _ => from.happy_path_next(),
        },
        _ => from.happy_path_next(),
    }
}

fn status_rank(status: SampleStatus) -> usize {
    SampleStatus::ALL
        .iter()
        .position(|candidate| *candidate == status)
        .unwrap_or_default()
}

fn is_backward(from: SampleStatus, to: SampleStatus) -> bool {
    !to.is_terminal() && status_rank(to) < status_rank(from)
}

/// Stage data owned by the statuses being re-entered; it has to be taken
/// again on the way forward.
pub(crate) fn stale_stages(from: SampleStatus, to: SampleStatus) -> Vec<Stage> {
    let (low, high) = (status_rank(to), status_rank(from));
    Stage::ALL
        .iter()
        .copied()
        .filter(|stage| {
            stage
                .owning_status()
                .map(status_rank)
                .is_some_and(|rank| rank >= low && rank <= high)
        })
        .collect()
}

/// Drops stage records and inspection trips for the statuses a backward move
/// re-enters. Returns how many rows went.
fn clear_reentered(
    conn: &Connection,
    id: &str,
    from: SampleStatus,
    to: SampleStatus,
) -> Result<usize, AppError> {
    let stale = stale_stages(from, to);
    let names = stale.iter().map(|stage| stage.as_str()).collect::<Vec<_>>();
    let mut cleared = db::delete_stages(conn, id, &names)?;
    if stale.contains(&Stage::Inspection) {
        cleared += db::delete_inspections(conn, id)?;
    }
    Ok(cleared)
}

/// Bumps the etag of `entry` inside `conn`'s transaction, failing if another
/// writer changed the entry since it was read.
fn claim_entry(conn: &Connection, entry: &EntryRecord, updated_at: &str) -> Result<(), AppError> {
    if db::touch_entry(conn, &entry.id, &entry.etag, updated_at, &new_event_id())? {
        Ok(())
    } else {
        Err(stale_etag(conn, entry)?)
    }
}

fn stale_etag(conn: &Connection, entry: &EntryRecord) -> Result<AppError, AppError> {
    let actual = db::get_entry(conn, &entry.id)?
        .map(|current| current.etag)
        .unwrap_or_default();
    Ok(AppError::PreconditionFailed {
        id: entry.id.clone(),
        expected: entry.etag.clone(),
        actual,
    })
}

fn chained_row(
    entry_id: &str,
    from: Option<SampleStatus>,
    to: SampleStatus,
    actor: &Actor,
    remark: Option<&str>,
    occurred_at: &str,
    prev_hash: String,
) -> TransitionRow {
    let mut row = TransitionRow {
        seq: 0,
        event_id: new_event_id(),
        entry_id: entry_id.to_string(),
        from_status: from.map(|status| status.as_str().to_string()),
        to_status: to.as_str().to_string(),
        actor_user: actor.user.clone(),
        actor_role: actor.role.as_str().to_string(),
        remark: remark.map(str::to_string),
        occurred_at: occurred_at.to_string(),
        prev_hash,
        hash: String::new(),
    };
    row.hash = audit::chain_hash(&ChainLink::from(&row));
    row
}

fn stage_row(
    entry_id: &str,
    stage: Stage,
    data: &Value,
    actor: &Actor,
    recorded_at: &str,
) -> StageRecordRow {
    StageRecordRow {
        entry_id: entry_id.to_string(),
        stage: stage.as_str().to_string(),
        data_json: data.to_string(),
        recorded_by: actor.user.clone(),
        recorded_role: actor.role.as_str().to_string(),
        recorded_at: recorded_at.to_string(),
    }
}

fn post_ledger(
    conn: &Connection,
    entry: &EntryRecord,
    snapshot: &StageSnapshot,
    actor: &Actor,
    posted_at: &str,
) -> Result<LedgerRow, AppError> {
    let financial = snapshot
        .manager_financial
        .as_ref()
        .ok_or(AppError::MissingStage(Stage::ManagerFinancial))?;
    let breakdown = &financial.breakdown;
    let variety = snapshot
        .inventory
        .as_ref()
        .and_then(|inventory| inventory.variety.clone())
        .unwrap_or_else(|| entry.variety.clone());

    let row = LedgerRow {
        id: format!("P-{}", Uuid::now_v7()),
        entry_id: entry.id.clone(),
        party_name: entry.party_name.clone(),
        broker_name: snapshot
            .entry
            .as_ref()
            .and_then(|details| details.broker_name.clone()),
        variety,
        bags: breakdown.bags,
        net_weight_grams: breakdown.net_weight.grams(),
        billable_weight_grams: breakdown.billable_weight.grams(),
        base_amount: breakdown.base_amount.raw(),
        brokerage_amount: breakdown.brokerage_amount.raw(),
        egb_amount: breakdown.egb_amount.raw(),
        lf_amount: breakdown.lf_amount.raw(),
        hamali_amount: breakdown.hamali_amount.raw(),
        party_payable: breakdown.party_payable.raw(),
        broker_payable: breakdown.broker_payable.raw(),
        total_purchase_cost: breakdown.total_purchase_cost.raw(),
        average_rate_per_quintal: breakdown.average_rate_per_quintal.raw(),
        posted_by: actor.user.clone(),
        posted_at: posted_at.to_string(),
    };
    db::insert_ledger(conn, &row)?;
    tracing::info!(
        entry = %entry.id,
        total = %breakdown.total_purchase_cost,
        "purchase posted to ledger"
    );
    Ok(row)
}

fn actor_pair(actor: &Actor) -> (&str, &str) {
    (&actor.user, actor.role.as_str())
}

fn ensure_parent_dir(path: &str) -> Result<(), AppError> {
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

impl From<EntryRecord> for SampleEntryView {
    fn from(value: EntryRecord) -> Self {
        let terminal = SampleStatus::from_str(&value.status)
            .map(SampleStatus::is_terminal)
            .unwrap_or(false);
        Self {
            id: value.id,
            party_name: value.party_name,
            variety: value.variety,
            location: value.location,
            bags: value.bags,
            status: value.status,
            terminal,
            created_by: value.created_by,
            created_at: value.created_at,
            updated_at: value.updated_at,
            etag: value.etag,
        }
    }
}

impl From<InspectionRow> for InspectionView {
    fn from(value: InspectionRow) -> Self {
        Self {
            id: value.id,
            bags: value.bags,
            lorry_number: value.lorry_number,
            remarks: value.remarks,
            inspected_by: value.inspected_by,
            inspected_at: value.inspected_at,
        }
    }
}

impl From<LedgerRow> for LedgerView {
    fn from(value: LedgerRow) -> Self {
        Self {
            id: value.id,
            entry_id: value.entry_id,
            party_name: value.party_name,
            broker_name: value.broker_name,
            variety: value.variety,
            bags: value.bags,
            net_weight: Weight(value.net_weight_grams),
            billable_weight: Weight(value.billable_weight_grams),
            base_amount: Money(value.base_amount),
            brokerage_amount: Money(value.brokerage_amount),
            egb_amount: Money(value.egb_amount),
            lf_amount: Money(value.lf_amount),
            hamali_amount: Money(value.hamali_amount),
            party_payable: Money(value.party_payable),
            broker_payable: Money(value.broker_payable),
            total_purchase_cost: Money(value.total_purchase_cost),
            average_rate_per_quintal: Money(value.average_rate_per_quintal),
            posted_by: value.posted_by,
            posted_at: value.posted_at,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("journal error: {0}")]
    Journal(#[from] EventWriteError),
    #[error("stage data error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Unit(#[from] UnitParseError),
    #[error(transparent)]
    ParseStatus(#[from] ParseStatusError),
    #[error(transparent)]
    ParseRole(#[from] ParseRoleError),
    #[error(transparent)]
    Actor(#[from] EmptyActorError),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("sample entry '{0}' not found")]
    NotFound(String),
    #[error("sample entry '{id}' is {status}; no further changes are allowed")]
    EntryClosed { id: String, status: SampleStatus },
    #[error("{stage} can only be recorded while the entry is in {expected} (currently {actual})")]
    WrongStage {
        stage: Stage,
        expected: SampleStatus,
        actual: SampleStatus,
    },
    #[error("role '{role}' may not record {stage}")]
    NotPermitted { role: Role, stage: Stage },
    #[error("{0} has not been recorded for this entry")]
    MissingStage(Stage),
    #[error("sample entry '{id}' changed: expected etag {expected}, current etag {actual}")]
    PreconditionFailed {
        id: String,
        expected: String,
        actual: String,
    },
}
