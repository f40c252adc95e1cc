use std::time::Duration;

use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Result, Row};

use crate::events::now_utc_rfc3339;

pub const CURRENT_SCHEMA_VERSION: i64 = 2;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: [Migration; 2] = [
    Migration {
        version: 1,
        name: "sample_workflow_v1",
        sql: r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sample_entry (
    id TEXT PRIMARY KEY,
    party_name TEXT NOT NULL,
    variety TEXT NOT NULL,
    location TEXT NOT NULL,
    bags INTEGER NOT NULL,
    status TEXT NOT NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    etag TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS stage_record (
    entry_id TEXT NOT NULL REFERENCES sample_entry(id),
    stage TEXT NOT NULL,
    data_json TEXT NOT NULL,
    recorded_by TEXT NOT NULL,
    recorded_role TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    PRIMARY KEY (entry_id, stage)
);

CREATE TABLE IF NOT EXISTS physical_inspection (
    id TEXT PRIMARY KEY,
    entry_id TEXT NOT NULL REFERENCES sample_entry(id),
    bags INTEGER NOT NULL,
    lorry_number TEXT,
    remarks TEXT,
    inspected_by TEXT NOT NULL,
    inspected_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transition_log (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id TEXT NOT NULL UNIQUE,
    entry_id TEXT NOT NULL REFERENCES sample_entry(id),
    from_status TEXT,
    to_status TEXT NOT NULL,
    actor_user TEXT NOT NULL,
    actor_role TEXT NOT NULL,
    remark TEXT,
    occurred_at TEXT NOT NULL,
    prev_hash TEXT NOT NULL,
    hash TEXT NOT NULL
);

CREATE TRIGGER IF NOT EXISTS transition_log_no_update
BEFORE UPDATE ON transition_log
BEGIN
    SELECT RAISE(ABORT, 'transition_log is append-only');
END;

CREATE TRIGGER IF NOT EXISTS transition_log_no_delete
BEFORE DELETE ON transition_log
BEGIN
    SELECT RAISE(ABORT, 'transition_log is append-only');
END;

CREATE INDEX IF NOT EXISTS idx_sample_entry_status ON sample_entry(status);
CREATE INDEX IF NOT EXISTS idx_sample_entry_updated_at ON sample_entry(updated_at);
CREATE INDEX IF NOT EXISTS idx_transition_log_entry ON transition_log(entry_id, seq);
CREATE INDEX IF NOT EXISTS idx_physical_inspection_entry ON physical_inspection(entry_id);
"#,
    },
    Migration {
        version: 2,
        name: "purchase_ledger_v1",
        sql: r#"
CREATE TABLE IF NOT EXISTS purchase_ledger (
    id TEXT PRIMARY KEY,
    entry_id TEXT NOT NULL UNIQUE REFERENCES sample_entry(id),
    party_name TEXT NOT NULL,
    broker_name TEXT,
    variety TEXT NOT NULL,
    bags INTEGER NOT NULL,
    net_weight_grams INTEGER NOT NULL,
    billable_weight_grams INTEGER NOT NULL,
    base_amount INTEGER NOT NULL,
    brokerage_amount INTEGER NOT NULL,
    egb_amount INTEGER NOT NULL,
    lf_amount INTEGER NOT NULL,
    hamali_amount INTEGER NOT NULL,
    party_payable INTEGER NOT NULL,
    broker_payable INTEGER NOT NULL,
    total_purchase_cost INTEGER NOT NULL,
    average_rate_per_quintal INTEGER NOT NULL,
    posted_by TEXT NOT NULL,
    posted_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_purchase_ledger_posted_at ON purchase_ledger(posted_at);
"#,
    },
];

pub fn open_connection(path: &str) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    configure_for_speed(&conn)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

fn configure_for_speed(conn: &Connection) -> Result<()> {
    conn.pragma_update(None::<DatabaseName>, "journal_mode", "WAL")?;
    conn.pragma_update(None::<DatabaseName>, "synchronous", "NORMAL")?;
    conn.pragma_update(None::<DatabaseName>, "foreign_keys", "ON")?;
    conn.pragma_update(None::<DatabaseName>, "temp_store", "MEMORY")?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(())
}

fn apply_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
);
"#,
    )?;

    for migration in MIGRATIONS {
        let already_applied: Option<i64> = tx
            .query_row(
                "SELECT version FROM schema_migrations WHERE version = ?1",
                params![migration.version],
                |row| row.get(0),
            )
            .optional()?;

        if already_applied.is_some() {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, now_utc_rfc3339()],
        )?;
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "applied schema migration"
        );
    }

    tx.execute(
        r#"
INSERT INTO meta (key, value)
VALUES ('schema_version', ?1)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    tx.commit()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    pub id: String,
    pub party_name: String,
    pub variety: String,
    pub location: String,
    pub bags: u32,
    pub status: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
    pub etag: String,
}

const ENTRY_COLUMNS: &str =
    "id, party_name, variety, location, bags, status, created_by, created_at, updated_at, etag";

fn entry_from_row(row: &Row<'_>) -> Result<EntryRecord> {
    Ok(EntryRecord {
        id: row.get(0)?,
        party_name: row.get(1)?,
        variety: row.get(2)?,
        location: row.get(3)?,
        bags: row.get(4)?,
        status: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        etag: row.get(9)?,
    })
}

pub fn insert_entry(conn: &Connection, entry: &EntryRecord) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO sample_entry ({ENTRY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        params![
            entry.id,
            entry.party_name,
            entry.variety,
            entry.location,
            entry.bags,
            entry.status,
            entry.created_by,
            entry.created_at,
            entry.updated_at,
            entry.etag
        ],
    )?;
    Ok(())
}

/// Compare-and-set on the etag. Returns false when another writer moved the
/// entry first.
pub fn update_entry_status(
    conn: &Connection,
    id: &str,
    expected_etag: &str,
    status: &str,
    updated_at: &str,
    etag: &str,
) -> Result<bool> {
    let changed = conn.execute(
        r#"
UPDATE sample_entry
SET status = ?3, updated_at = ?4, etag = ?5
WHERE id = ?1 AND etag = ?2
"#,
        params![id, expected_etag, status, updated_at, etag],
    )?;
    Ok(changed == 1)
}

/// Bumps the etag of an entry whose stage data changed. Same compare-and-set
/// contract as `update_entry_status`.
pub fn touch_entry(
    conn: &Connection,
    id: &str,
    expected_etag: &str,
    updated_at: &str,
    etag: &str,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE sample_entry SET updated_at = ?3, etag = ?4 WHERE id = ?1 AND etag = ?2",
        params![id, expected_etag, updated_at, etag],
    )?;
    Ok(changed == 1)
}

pub fn get_entry(conn: &Connection, id: &str) -> Result<Option<EntryRecord>> {
    conn.query_row(
        &format!("SELECT {ENTRY_COLUMNS} FROM sample_entry WHERE id = ?1"),
        params![id],
        entry_from_row,
    )
    .optional()
}

pub fn list_entries(conn: &Connection) -> Result<Vec<EntryRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM sample_entry ORDER BY updated_at DESC, id ASC"
    ))?;
    let rows = stmt.query_map([], entry_from_row)?;
    rows.collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecordRow {
    pub entry_id: String,
    pub stage: String,
    pub data_json: String,
    pub recorded_by: String,
    pub recorded_role: String,
    pub recorded_at: String,
}

pub fn upsert_stage(conn: &Connection, row: &StageRecordRow) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO stage_record (entry_id, stage, data_json, recorded_by, recorded_role, recorded_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT(entry_id, stage) DO UPDATE SET
    data_json = excluded.data_json,
    recorded_by = excluded.recorded_by,
    recorded_role = excluded.recorded_role,
    recorded_at = excluded.recorded_at
"#,
        params![
            row.entry_id,
            row.stage,
            row.data_json,
            row.recorded_by,
            row.recorded_role,
            row.recorded_at
        ],
    )?;
    Ok(())
}

pub fn delete_stages(conn: &Connection, entry_id: &str, stages: &[&str]) -> Result<usize> {
    let mut removed = 0;
    for stage in stages {
        removed += conn.execute(
            "DELETE FROM stage_record WHERE entry_id = ?1 AND stage = ?2",
            params![entry_id, stage],
        )?;
    }
    Ok(removed)
}

pub fn list_stages(conn: &Connection, entry_id: &str) -> Result<Vec<StageRecordRow>> {
    let mut stmt = conn.prepare(
        r#"
SELECT entry_id, stage, data_json, recorded_by, recorded_role, recorded_at
FROM stage_record
WHERE entry_id = ?1
ORDER BY recorded_at ASC, stage ASC
"#,
    )?;
    let rows = stmt.query_map(params![entry_id], |row| {
        Ok(StageRecordRow {
            entry_id: row.get(0)?,
            stage: row.get(1)?,
            data_json: row.get(2)?,
            recorded_by: row.get(3)?,
            recorded_role: row.get(4)?,
            recorded_at: row.get(5)?,
        })
    })?;
    rows.collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionRow {
    pub id: String,
    pub entry_id: String,
    pub bags: u32,
    pub lorry_number: Option<String>,
    pub remarks: Option<String>,
    pub inspected_by: String,
    pub inspected_at: String,
}

pub fn insert_inspection(conn: &Connection, row: &InspectionRow) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO physical_inspection (id, entry_id, bags, lorry_number, remarks, inspected_by, inspected_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
"#,
        params![
            row.id,
            row.entry_id,
            row.bags,
            row.lorry_number,
            row.remarks,
            row.inspected_by,
            row.inspected_at
        ],
    )?;
    Ok(())
}

pub fn list_inspections(conn: &Connection, entry_id: &str) -> Result<Vec<InspectionRow>> {
    let mut stmt = conn.prepare(
        r#"
SELECT id, entry_id, bags, lorry_number, remarks, inspected_by, inspected_at
FROM physical_inspection
WHERE entry_id = ?1
ORDER BY inspected_at ASC, id ASC
"#,
    )?;
    let rows = stmt.query_map(params![entry_id], |row| {
        Ok(InspectionRow {
            id: row.get(0)?,
            entry_id: row.get(1)?,
            bags: row.get(2)?,
            lorry_number: row.get(3)?,
            remarks: row.get(4)?,
            inspected_by: row.get(5)?,
            inspected_at: row.get(6)?,
        })
    })?;
    rows.collect()
}

pub fn delete_inspections(conn: &Connection, entry_id: &str) -> Result<usize> {
    conn.execute(
        "DELETE FROM physical_inspection WHERE entry_id = ?1",
        params![entry_id],
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRow {
    pub seq: i64,
    pub event_id: String,
    pub entry_id: String,
    pub from_status: Option<String>,
    pub to_status: String,
    pub actor_user: String,
    pub actor_role: String,
    pub remark: Option<String>,
    pub occurred_at: String,
    pub prev_hash: String,
    pub hash: String,
}

const TRANSITION_COLUMNS: &str = "seq, event_id, entry_id, from_status, to_status, actor_user, actor_role, remark, occurred_at, prev_hash, hash";

fn transition_from_row(row: &Row<'_>) -> Result<TransitionRow> {
    Ok(TransitionRow {
        seq: row.get(0)?,
        event_id: row.get(1)?,
        entry_id: row.get(2)?,
        from_status: row.get(3)?,
        to_status: row.get(4)?,
        actor_user: row.get(5)?,
        actor_role: row.get(6)?,
        remark: row.get(7)?,
        occurred_at: row.get(8)?,
        prev_hash: row.get(9)?,
        hash: row.get(10)?,
    })
}

/// Appends one audit row and returns its sequence number. `row.seq` is
/// ignored; SQLite assigns it.
pub fn append_transition(conn: &Connection, row: &TransitionRow) -> Result<i64> {
    conn.execute(
        r#"
INSERT INTO transition_log (
    event_id, entry_id, from_status, to_status, actor_user, actor_role,
    remark, occurred_at, prev_hash, hash
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
"#,
        params![
            row.event_id,
            row.entry_id,
            row.from_status,
            row.to_status,
            row.actor_user,
            row.actor_role,
            row.remark,
            row.occurred_at,
            row.prev_hash,
            row.hash
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn last_transition(conn: &Connection, entry_id: &str) -> Result<Option<TransitionRow>> {
    conn.query_row(
        &format!(
            "SELECT {TRANSITION_COLUMNS} FROM transition_log WHERE entry_id = ?1 ORDER BY seq DESC LIMIT 1"
        ),
        params![entry_id],
        transition_from_row,
    )
    .optional()
}

pub fn list_transitions(conn: &Connection, entry_id: &str) -> Result<Vec<TransitionRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TRANSITION_COLUMNS} FROM transition_log WHERE entry_id = ?1 ORDER BY seq ASC"
    ))?;
    let rows = stmt.query_map(params![entry_id], transition_from_row)?;
    rows.collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub id: String,
    pub entry_id: String,
    pub party_name: String,
    pub broker_name: Option<String>,
    pub variety: String,
    pub bags: u32,
    pub net_weight_grams: i64,
    pub billable_weight_grams: i64,
    pub base_amount: i64,
    pub brokerage_amount: i64,
    pub egb_amount: i64,
    pub lf_amount: i64,
    pub hamali_amount: i64,
    pub party_payable: i64,
    pub broker_payable: i64,
    pub total_purchase_cost: i64,
    pub average_rate_per_quintal: i64,
    pub posted_by: String,
    pub posted_at: String,
}

const LEDGER_COLUMNS: &str = "id, entry_id, party_name, broker_name, variety, bags, net_weight_grams, billable_weight_grams, base_amount, brokerage_amount, egb_amount, lf_amount, hamali_amount, party_payable, broker_payable, total_purchase_cost, average_rate_per_quintal, posted_by, posted_at";

fn ledger_from_row(row: &Row<'_>) -> Result<LedgerRow> {
    Ok(LedgerRow {
        id: row.get(0)?,
        entry_id: row.get(1)?,
        party_name: row.get(2)?,
        broker_name: row.get(3)?,
        variety: row.get(4)?,
        bags: row.get(5)?,
        net_weight_grams: row.get(6)?,
        billable_weight_grams: row.get(7)?,
        base_amount: row.get(8)?,
        brokerage_amount: row.get(9)?,
        egb_amount: row.get(10)?,
        lf_amount: row.get(11)?,
        hamali_amount: row.get(12)?,
        party_payable: row.get(13)?,
        broker_payable: row.get(14)?,
        total_purchase_cost: row.get(15)?,
        average_rate_per_quintal: row.get(16)?,
        posted_by: row.get(17)?,
        posted_at: row.get(18)?,
    })
}

pub fn insert_ledger(conn: &Connection, row: &LedgerRow) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO purchase_ledger ({LEDGER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
        ),
        params![
            row.id,
            row.entry_id,
            row.party_name,
            row.broker_name,
            row.variety,
            row.bags,
            row.net_weight_grams,
            row.billable_weight_grams,
            row.base_amount,
            row.brokerage_amount,
            row.egb_amount,
            row.lf_amount,
            row.hamali_amount,
            row.party_payable,
            row.broker_payable,
            row.total_purchase_cost,
            row.average_rate_per_quintal,
            row.posted_by,
            row.posted_at
        ],
    )?;
    Ok(())
}

pub fn list_ledger(conn: &Connection) -> Result<Vec<LedgerRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LEDGER_COLUMNS} FROM purchase_ledger ORDER BY posted_at ASC, id ASC"
    ))?;
    let rows = stmt.query_map([], ledger_from_row)?;
    rows.collect()
}

pub fn get_ledger_for_entry(conn: &Connection, entry_id: &str) -> Result<Option<LedgerRow>> {
    conn.query_row(
        &format!("SELECT {LEDGER_COLUMNS} FROM purchase_ledger WHERE entry_id = ?1"),
        params![entry_id],
        ledger_from_row,
    )
    .optional()
}
