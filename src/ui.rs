use std::io::{self, IsTerminal};

use crate::app::{EntryDetailView, EntryFilter, LedgerView, SampleEntryView};
use crate::audit::{AuditReport, TransitionRecord};
use crate::pricing::PricingBreakdown;

pub fn print_entry_list(title: &str, entries: &[SampleEntryView], filter: Option<&EntryFilter>) {
    let palette = Palette::auto();
    println!("{}", palette.heading(title));
    if let Some(summary) = filter.and_then(filter_summary) {
        println!("{}", palette.dim(&format!("filters: {summary}")));
    }

    if entries.is_empty() {
        println!("{}", palette.dim("no samples matched"));
        return;
    }

    for entry in entries {
        println!("{}", format_entry_row(entry, &palette));
    }
    println!("{}", palette.dim(&format!("{} sample(s)", entries.len())));
}

pub fn print_entry(detail: &EntryDetailView) {
    let palette = Palette::auto();
    let entry = &detail.entry;
    println!("{}", format_entry_row(entry, &palette));
    println!("  location: {}  bags: {}", entry.location, entry.bags);
    println!(
        "  {}",
        palette.dim(&format!(
            "created by {} at {}, updated {}",
            entry.created_by, entry.created_at, entry.updated_at
        ))
    );
    println!("  {}", palette.dim(&format!("etag: {}", entry.etag)));

    let stages = &detail.stages;
    if let Some(quality) = &stages.quality {
        println!(
            "  quality: moisture {} cutting {} bend {} mix {} sk {} grains {}",
            quality.moisture,
            quality.cutting,
            quality.bend,
            quality.mix,
            quality.sk,
            quality.grains_count
        );
    }
    if let Some(lot) = &stages.lot_selection {
        println!("  lot decision: {}", lot.decision);
    }
    if let Some(cooking) = &stages.cooking {
        println!("  cooking: {}", cooking.status);
    }
    if let Some(offer) = &stages.offer {
        println!("  offer: {} {}", offer.base_rate, offer.basis);
    }
    if let Some(allotment) = &stages.allotment {
        println!(
            "  allotted: {} bags to {} ({} inspected)",
            allotment.bags, allotment.supervisor, stages.inspected_bags
        );
    }
    if let Some(inventory) = &stages.inventory {
        println!(
            "  inventory: net {} ({} bags) at {}",
            inventory.net_weight(),
            inventory.bags_received,
            inventory.storage_location
        );
    }
    if let Some(financial) = &stages.manager_financial {
        println!(
            "  total purchase cost: {}",
            financial.breakdown.total_purchase_cost
        );
    }
    if let Some(purchase) = &detail.purchase {
        println!(
            "  posted {} by {} on {}",
            purchase.id, purchase.posted_by, purchase.posted_at
        );
    }
    if let Some(failure) = &stages.failure_reason {
        println!("  failure reason: {}", failure.reason);
    }

    if !detail.next.is_empty() {
        println!(
            "  {}",
            palette.dim(&format!("next: {}", detail.next.join(", ")))
        );
    }
}

pub fn print_history(records: &[TransitionRecord]) {
    let palette = Palette::auto();
    for record in records {
        let from = record.from.as_deref().unwrap_or("(new)");
        let mut line = format!(
            "#{} {} {} -> {} by {} ({})",
            record.seq,
            palette.dim(&record.occurred_at),
            from,
            palette.status(&record.to),
            record.actor_user,
            record.actor_role
        );
        if let Some(remark) = &record.remark {
            line.push_str(&format!(": {remark}"));
        }
        println!("{line}");
    }
}

pub fn print_audit_report(report: &AuditReport) {
    let palette = Palette::auto();
    if report.is_clean() {
        println!(
            "{} {} record(s) verified",
            palette.id(&report.entry_id),
            report.records
        );
        return;
    }
    println!(
        "{} {} issue(s) in {} record(s)",
        palette.id(&report.entry_id),
        report.issues.len(),
        report.records
    );
    for issue in &report.issues {
        println!("  {}", palette.paint("31", &issue.to_string()));
    }
}

pub fn print_quote(breakdown: &PricingBreakdown) {
    let rows = [
        ("net weight", breakdown.net_weight.to_string()),
        ("sute", breakdown.sute_weight.to_string()),
        ("billable weight", breakdown.billable_weight.to_string()),
        ("base amount", breakdown.base_amount.to_string()),
        ("brokerage", breakdown.brokerage_amount.to_string()),
        ("egb", breakdown.egb_amount.to_string()),
        ("lorry freight", breakdown.lf_amount.to_string()),
        ("hamali", breakdown.hamali_amount.to_string()),
        ("party payable", breakdown.party_payable.to_string()),
        ("broker payable", breakdown.broker_payable.to_string()),
        ("total purchase cost", breakdown.total_purchase_cost.to_string()),
        (
            "average rate / quintal",
            breakdown.average_rate_per_quintal.to_string(),
        ),
    ];
    for (label, value) in rows {
        println!("{label:>24}  {value}");
    }
}

pub fn print_ledger(rows: &[LedgerView]) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Purchase ledger"));
    if rows.is_empty() {
        println!("{}", palette.dim("nothing posted yet"));
        return;
    }
    for row in rows {
        println!(
            "{} {} {} {} bags, total {} (party {}, broker {})",
            palette.dim(&row.posted_at),
            palette.id(&row.entry_id),
            row.party_name,
            row.bags,
            row.total_purchase_cost,
            row.party_payable,
            row.broker_payable
        );
    }
}

pub fn entry_line(entry: &SampleEntryView) -> String {
    format_entry_row(entry, &Palette::auto())
}

fn format_entry_row(entry: &SampleEntryView, palette: &Palette) -> String {
    format!(
        "{} {} {} {}",
        palette.id(&entry.id),
        palette.status(&entry.status),
        entry.party_name,
        palette.dim(&format!("({}, {} bags)", entry.variety, entry.bags))
    )
}

fn filter_summary(filter: &EntryFilter) -> Option<String> {
    let mut parts = Vec::new();
    if filter.include_terminal {
        parts.push("all=true".to_string());
    }
    if let Some(status) = filter.status {
        parts.push(format!("status={status}"));
    }
    if let Some(party) = filter.party.as_deref().map(str::trim) {
        if !party.is_empty() {
            parts.push(format!("party={party}"));
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn id(&self, text: &str) -> String {
        self.paint("1;94", text)
    }

    fn status(&self, status: &str) -> String {
        let upper = status.to_ascii_uppercase();
        self.paint(status_color_code(status), &format!("[{upper}]"))
    }
}

fn status_color_code(status: &str) -> &'static str {
    match status.trim().to_ascii_lowercase().as_str() {
        "staff_entry" | "quality_check" | "lot_selection" | "cooking_report" => "34",
        "final_report" | "lot_allotment" | "physical_inspection" | "inventory_entry" => "36",
        "owner_financial" | "manager_financial" | "final_review" => "33",
        "completed" => "32",
        "failed" => "31",
        _ => "37",
    }
}
