pub mod role;
pub mod stage;
pub mod status;
pub mod units;
