//! CLI command implementations

mod config;
mod fact;
mod serve;
mod simulate;
mod trigger;
mod upload;

pub use config::{config, ConfigArgs};
pub use fact::{fact, FactArgs};
pub use serve::{serve, ServeArgs};
pub use simulate::{simulate, SimulateArgs};
pub use trigger::{trigger, TriggerArgs};
pub use upload::{upload, UploadArgs};
