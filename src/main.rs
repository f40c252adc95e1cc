mod app;
mod audit;
mod cli;
mod completions;
mod config;
mod db;
mod domain;
mod events;
mod logging;
mod pricing;
mod ui;
mod workflow;

use app::{App, AppError, EntryFilter, SampleEntryView};
use cli::{Cli, Commands};
use config::MillConfig;
use domain::role::{Actor, Role};
use domain::stage::{
    CookingReport, EntryDetails, FailureReason, FinancialTerms, InventoryRecord, LotAllotment,
    LotSelection, ManagerAdjustments, OfferReport, PhysicalInspection, QualityParameters,
};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).expect("json serialization should work")
    );
}

fn run() -> Result<(), AppError> {
    use clap::Parser;

    let cli = Cli::parse();
    let config = MillConfig::load(&cli.root)?;
    logging::init_logging(
        cli.log_level.as_deref().unwrap_or(&config.log.level),
        cli.log_format.unwrap_or(config.log.format),
    );

    match &cli.command {
        Commands::Completions(args) => return completions::run_completions_command(args.shell),
        Commands::Workflow => {
            let table = match config.workflow_path(&cli.root) {
                Some(path) => workflow::WorkflowTable::from_toml(&std::fs::read_to_string(path)?)?,
                None => workflow::WorkflowTable::load()?,
            };
            print!("{}", table.render());
            return Ok(());
        }
        _ => {}
    }

    let app = App::open(&cli.db, cli.root.clone(), &config)?;
    let json = cli.json;

    match cli.command {
        Commands::New(args) => {
            let actor = require_actor(&cli.user, cli.role)?;
            let entry = app.create_entry(
                &actor,
                EntryDetails {
                    party_name: args.party,
                    broker_name: args.broker,
                    variety: args.variety,
                    location: args.location,
                    bags: args.bags,
                    collected_by: args.collected_by,
                    lorry_number: args.lorry,
                },
            )?;
            report_entry("created", &entry, json);
        }
        Commands::Quality(args) => {
            let actor = require_actor(&cli.user, cli.role)?;
            let entry = app.record_quality(
                &args.id,
                &actor,
                QualityParameters {
                    moisture: args.moisture,
                    cutting: args.cutting,
                    bend: args.bend,
                    mix: args.mix,
                    sk: args.sk,
                    grains_count: args.grains_count,
                    wb_present: args.wb_present,
                    remarks: args.remarks,
                },
            )?;
            report_entry("recorded quality for", &entry, json);
        }
        Commands::Lot(args) => {
            let actor = require_actor(&cli.user, cli.role)?;
            let entry = app.record_lot_selection(
                &args.id,
                &actor,
                LotSelection {
                    decision: args.decision,
                    remarks: args.remarks,
                },
            )?;
            report_entry("recorded lot decision for", &entry, json);
        }
        Commands::Cooking(args) => {
            let actor = require_actor(&cli.user, cli.role)?;
            let entry = app.record_cooking_report(
                &args.id,
                &actor,
                CookingReport {
                    status: args.status,
                    remarks: args.remarks,
                },
            )?;
            report_entry("recorded cooking report for", &entry, json);
        }
        Commands::Offer(args) => {
            let actor = require_actor(&cli.user, cli.role)?;
            let entry = app.record_offer(
                &args.id,
                &actor,
                OfferReport {
                    base_rate: args.rate,
                    basis: args.basis,
                    remarks: args.remarks,
                },
            )?;
            report_entry("recorded offer for", &entry, json);
        }
        Commands::Allot(args) => {
            let actor = require_actor(&cli.user, cli.role)?;
            let entry = app.allot_lot(
                &args.id,
                &actor,
                LotAllotment {
                    supervisor: args.supervisor,
                    bags: args.bags,
                },
            )?;
            report_entry("allotted", &entry, json);
        }
        Commands::Inspect(args) => {
            let actor = require_actor(&cli.user, cli.role)?;
            let entry = app.add_inspection(
                &args.id,
                &actor,
                PhysicalInspection {
                    bags: args.bags,
                    lorry_number: args.lorry,
                    remarks: args.remarks,
                },
            )?;
            report_entry("recorded inspection for", &entry, json);
        }
        Commands::Inventory(args) => {
            let actor = require_actor(&cli.user, cli.role)?;
            let entry = app.record_inventory(
                &args.id,
                &actor,
                InventoryRecord {
                    gross_weight: args.gross,
                    tare_weight: args.tare,
                    bags_received: args.bags,
                    storage_location: args.location,
                    variety: args.variety,
                },
            )?;
            report_entry("recorded inventory for", &entry, json);
        }
        Commands::Terms(args) => {
            let actor = require_actor(&cli.user, cli.role)?;
            let entry = app.record_financial_terms(
                &args.id,
                &actor,
                FinancialTerms {
                    base_rate: args.base_rate,
                    base_basis: args.base_basis,
                    sute_rate: args.sute,
                    sute_basis: args.sute_basis,
                    brokerage_rate: args.brokerage,
                    brokerage_basis: args.brokerage_basis,
                    egb_rate: args.egb,
                    lf_rate: args.lf,
                    hamali_rate: args.hamali,
                },
            )?;
            report_entry("recorded terms for", &entry, json);
        }
        Commands::Confirm(args) => {
            let actor = require_actor(&cli.user, cli.role)?;
            let entry = app.record_manager_adjustments(
                &args.id,
                &actor,
                ManagerAdjustments {
                    egb_rate: args.egb,
                    lf_rate: args.lf,
                    hamali_rate: args.hamali,
                    remarks: args.remarks,
                },
            )?;
            report_entry("confirmed pricing for", &entry, json);
        }
        Commands::FailReason(args) => {
            let actor = require_actor(&cli.user, cli.role)?;
            let entry = app.record_failure_reason(
                &args.id,
                &actor,
                FailureReason {
                    reason: args.reason,
                },
            )?;
            report_entry("recorded failure reason for", &entry, json);
        }
        Commands::Move(args) => {
            let actor = require_actor(&cli.user, cli.role)?;
            let entry = app.transition(
                &args.id,
                args.status,
                &actor,
                args.remark.as_deref(),
                args.if_match.as_deref(),
            )?;
            report_entry("moved", &entry, json);
        }
        Commands::Next(args) => {
            let actor = require_actor(&cli.user, cli.role)?;
            let entry = app.advance(
                &args.id,
                &actor,
                args.remark.as_deref(),
                args.if_match.as_deref(),
            )?;
            report_entry("moved", &entry, json);
        }
        Commands::Show(args) => {
            let detail = app
                .show(&args.id)?
                .ok_or_else(|| AppError::NotFound(args.id.clone()))?;
            if json {
                print_json(&detail);
            } else {
                ui::print_entry(&detail);
            }
        }
        Commands::Ls(args) => {
            let filter = EntryFilter {
                status: args.status,
                party: args.party,
                include_terminal: args.all,
            };
            let entries = app.list(&filter)?;
            if json {
                print_json(&entries);
            } else {
                ui::print_entry_list("Samples", &entries, Some(&filter));
            }
        }
        Commands::Queue(args) => {
            let role = args.role.or(cli.role).ok_or_else(|| {
                AppError::InvalidArgument(
                    "a role is required: pass one or set --role / MILL_ROLE".to_string(),
                )
            })?;
            let entries = app.queue(role)?;
            if json {
                print_json(&entries);
            } else {
                ui::print_entry_list(&format!("Queue for {role}"), &entries, None);
            }
        }
        Commands::History(args) => {
            let records = app.history(&args.id)?;
            if json {
                print_json(&records);
            } else {
                ui::print_history(&records);
            }
        }
        Commands::Verify(args) => {
            let report = app.verify(&args.id)?;
            if json {
                print_json(&report);
            } else {
                ui::print_audit_report(&report);
            }
            if !report.is_clean() {
                return Err(AppError::InvalidArgument(format!(
                    "audit chain for '{}' failed verification",
                    report.entry_id
                )));
            }
        }
        Commands::Ledger => {
            let rows = app.ledger()?;
            if json {
                print_json(&rows);
            } else {
                ui::print_ledger(&rows);
            }
        }
        Commands::Quote(args) => {
            let breakdown = app.quote(&args.id)?;
            if json {
                print_json(&breakdown);
            } else {
                ui::print_quote(&breakdown);
            }
        }
        Commands::Workflow | Commands::Completions(_) => {}
    }

    Ok(())
}

fn require_actor(user: &Option<String>, role: Option<Role>) -> Result<Actor, AppError> {
    let user = user.as_deref().ok_or_else(|| {
        AppError::InvalidArgument("--user (or MILL_USER) is required for changes".to_string())
    })?;
    let role = role.ok_or_else(|| {
        AppError::InvalidArgument("--role (or MILL_ROLE) is required for changes".to_string())
    })?;
    Ok(Actor::new(user, role)?)
}

fn report_entry(verb: &str, entry: &SampleEntryView, json: bool) {
    if json {
        print_json(entry);
    } else {
        println!("{verb} {}", ui::entry_line(entry));
    }
}

#[cfg(test)]
mod main_tests;
