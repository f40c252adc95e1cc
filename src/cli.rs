use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::domain::role::Role;
use crate::domain::stage::{CookingStatus, LotDecision, RateBasis, SuteBasis};
use crate::domain::status::SampleStatus;
use crate::domain::units::{Money, Percent, Weight};
use crate::logging::LogFormat;

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

pub fn styled_command() -> clap::Command {
    Cli::command()
}

#[derive(Debug, Parser)]
#[command(name = "mill")]
#[command(bin_name = "mill")]
#[command(version)]
#[command(about = "Rice-mill sample workflow: from paddy sample to purchase ledger")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'd',
        long,
        global = true,
        env = "MILL_DB_PATH",
        default_value = ".mill/state.sqlite",
        help = "Path to the SQLite database."
    )]
    pub db: String,

    #[arg(
        short = 'C',
        long,
        global = true,
        env = "MILL_ROOT",
        default_value = ".",
        help = "Mill root that holds mill.toml and .mill/journal."
    )]
    pub root: PathBuf,

    #[arg(
        short = 'u',
        long,
        global = true,
        env = "MILL_USER",
        help = "Name of the person making the change."
    )]
    pub user: Option<String>,

    #[arg(
        short = 'r',
        long,
        global = true,
        env = "MILL_ROLE",
        help = "Role of the person making the change."
    )]
    pub role: Option<Role>,

    #[arg(long, global = true, help = "Print machine-readable JSON.")]
    pub json: bool,

    #[arg(
        long = "log-level",
        global = true,
        env = "MILL_LOG",
        help = "Log level (overrides [log] level in mill.toml)."
    )]
    pub log_level: Option<String>,

    #[arg(
        long = "log-format",
        global = true,
        help = "Log format: compact, pretty or json."
    )]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Register a new paddy sample.")]
    New(NewArgs),
    #[command(about = "Record quality parameters.")]
    Quality(QualityArgs),
    #[command(about = "Record the lot selection decision.")]
    Lot(LotArgs),
    #[command(about = "Record the cooking report.")]
    Cooking(CookingArgs),
    #[command(about = "Record the offered rate for the final report.")]
    Offer(OfferArgs),
    #[command(about = "Allot the lot to a physical supervisor.")]
    Allot(AllotArgs),
    #[command(about = "Record one physical inspection trip.")]
    Inspect(InspectArgs),
    #[command(about = "Record weighbridge and storage details.")]
    Inventory(InventoryArgs),
    #[command(about = "Record the owner's financial terms.")]
    Terms(TermsArgs),
    #[command(about = "Confirm pricing with optional manager adjustments.")]
    Confirm(ConfirmArgs),
    #[command(about = "Record why a sample is being failed.")]
    FailReason(FailReasonArgs),
    #[command(about = "Move a sample to a status with transition validation.")]
    Move(MoveArgs),
    #[command(about = "Advance a sample to its next status.")]
    Next(NextArgs),
    #[command(about = "Show one sample with its stage data.")]
    Show(IdArgs),
    #[command(about = "List samples.")]
    Ls(ListArgs),
    #[command(about = "List samples waiting on a role.")]
    Queue(QueueArgs),
    #[command(about = "Show the audit trail of a sample.")]
    History(IdArgs),
    #[command(about = "Verify the audit hash chain of a sample.")]
    Verify(IdArgs),
    #[command(about = "List posted purchases.")]
    Ledger,
    #[command(about = "Preview the purchase calculation for a sample.")]
    Quote(IdArgs),
    #[command(about = "Print the transition table.")]
    Workflow,
    #[command(about = "Generate shell completions.")]
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct IdArgs {
    #[arg(help = "Sample id.")]
    pub id: String,
}

#[derive(Debug, Args)]
pub struct NewArgs {
    #[arg(short = 'p', long, help = "Party (seller) name.")]
    pub party: String,

    #[arg(short = 'b', long, help = "Broker name.")]
    pub broker: Option<String>,

    #[arg(short = 'v', long, help = "Paddy variety.")]
    pub variety: String,

    #[arg(short = 'l', long, help = "Village or market the sample came from.")]
    pub location: String,

    #[arg(short = 'n', long, help = "Number of bags offered.")]
    pub bags: u32,

    #[arg(long = "collected-by", help = "Who collected the sample.")]
    pub collected_by: Option<String>,

    #[arg(long, help = "Lorry registration number.")]
    pub lorry: Option<String>,
}

#[derive(Debug, Args)]
pub struct QualityArgs {
    #[arg(help = "Sample id.")]
    pub id: String,

    #[arg(long, help = "Moisture percent.")]
    pub moisture: Percent,

    #[arg(long, help = "Cutting percent.")]
    pub cutting: Percent,

    #[arg(long, help = "Bend percent.")]
    pub bend: Percent,

    #[arg(long, help = "Mix percent.")]
    pub mix: Percent,

    #[arg(long, help = "SK percent.")]
    pub sk: Percent,

    #[arg(long = "grains", help = "Grain count.")]
    pub grains_count: u32,

    #[arg(long = "wb", help = "White-belly grains present.")]
    pub wb_present: bool,

    #[arg(long)]
    pub remarks: Option<String>,
}

#[derive(Debug, Args)]
pub struct LotArgs {
    #[arg(help = "Sample id.")]
    pub id: String,

    #[arg(help = "pass, resample or fail.")]
    pub decision: LotDecision,

    #[arg(long)]
    pub remarks: Option<String>,
}

#[derive(Debug, Args)]
pub struct CookingArgs {
    #[arg(help = "Sample id.")]
    pub id: String,

    #[arg(help = "pass, medium or fail.")]
    pub status: CookingStatus,

    #[arg(long)]
    pub remarks: Option<String>,
}

#[derive(Debug, Args)]
pub struct OfferArgs {
    #[arg(help = "Sample id.")]
    pub id: String,

    #[arg(long, help = "Offered base rate in rupees.")]
    pub rate: Money,

    #[arg(long, default_value = "per_quintal", help = "per_quintal or per_bag.")]
    pub basis: RateBasis,

    #[arg(long)]
    pub remarks: Option<String>,
}

#[derive(Debug, Args)]
pub struct AllotArgs {
    #[arg(help = "Sample id.")]
    pub id: String,

    #[arg(short = 's', long, help = "Physical supervisor receiving the lot.")]
    pub supervisor: String,

    #[arg(short = 'n', long, help = "Bags allotted.")]
    pub bags: u32,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    #[arg(help = "Sample id.")]
    pub id: String,

    #[arg(short = 'n', long, help = "Bags inspected on this trip.")]
    pub bags: u32,

    #[arg(long, help = "Lorry registration number.")]
    pub lorry: Option<String>,

    #[arg(long)]
    pub remarks: Option<String>,
}

#[derive(Debug, Args)]
pub struct InventoryArgs {
    #[arg(help = "Sample id.")]
    pub id: String,

    #[arg(long, help = "Gross weight in kg.")]
    pub gross: Weight,

    #[arg(long, help = "Tare weight in kg.")]
    pub tare: Weight,

    #[arg(short = 'n', long, help = "Bags received.")]
    pub bags: u32,

    #[arg(short = 'l', long, help = "Godown or storage location.")]
    pub location: String,

    #[arg(long, help = "Variety as received, if different.")]
    pub variety: Option<String>,
}

#[derive(Debug, Args)]
pub struct TermsArgs {
    #[arg(help = "Sample id.")]
    pub id: String,

    #[arg(long = "base-rate", help = "Base rate in rupees.")]
    pub base_rate: Money,

    #[arg(long = "base-basis", default_value = "per_quintal")]
    pub base_basis: RateBasis,

    #[arg(long, default_value = "0", help = "Sute deduction in kg.")]
    pub sute: Weight,

    #[arg(long = "sute-basis", default_value = "per_ton")]
    pub sute_basis: SuteBasis,

    #[arg(long, default_value = "0", help = "Brokerage rate in rupees.")]
    pub brokerage: Money,

    #[arg(long = "brokerage-basis", default_value = "per_quintal")]
    pub brokerage_basis: RateBasis,

    #[arg(long, default_value = "0", help = "Empty gunny bag rate per bag.")]
    pub egb: Money,

    #[arg(long, default_value = "0", help = "Lorry freight per bag.")]
    pub lf: Money,

    #[arg(long, default_value = "0", help = "Hamali (loading) per bag.")]
    pub hamali: Money,
}

#[derive(Debug, Args)]
pub struct ConfirmArgs {
    #[arg(help = "Sample id.")]
    pub id: String,

    #[arg(long, help = "Override the empty gunny bag rate.")]
    pub egb: Option<Money>,

    #[arg(long, help = "Override the lorry freight rate.")]
    pub lf: Option<Money>,

    #[arg(long, help = "Override the hamali rate.")]
    pub hamali: Option<Money>,

    #[arg(long)]
    pub remarks: Option<String>,
}

#[derive(Debug, Args)]
pub struct FailReasonArgs {
    #[arg(help = "Sample id.")]
    pub id: String,

    #[arg(help = "Why the sample is failing.")]
    pub reason: String,
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    #[arg(help = "Sample id.")]
    pub id: String,

    #[arg(help = "Target status.")]
    pub status: SampleStatus,

    #[arg(short = 'm', long, help = "Remark stored in the audit trail.")]
    pub remark: Option<String>,

    #[arg(long = "if-match", help = "Require this etag to match before writing.")]
    pub if_match: Option<String>,
}

#[derive(Debug, Args)]
pub struct NextArgs {
    #[arg(help = "Sample id.")]
    pub id: String,

    #[arg(short = 'm', long, help = "Remark stored in the audit trail.")]
    pub remark: Option<String>,

    #[arg(long = "if-match", help = "Require this etag to match before writing.")]
    pub if_match: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(short = 's', long, help = "Only samples in this status.")]
    pub status: Option<SampleStatus>,

    #[arg(short = 'p', long, help = "Party name contains this text.")]
    pub party: Option<String>,

    #[arg(short = 'a', long, help = "Include completed and failed samples.")]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct QueueArgs {
    #[arg(help = "Role to list work for (defaults to --role).")]
    pub role: Option<Role>,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    #[arg(value_enum, help = "Shell name. Detected from $SHELL if omitted.")]
    pub shell: Option<Shell>,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
