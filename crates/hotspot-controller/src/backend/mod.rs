//! Concrete group service implementations.

pub mod simulated;
pub mod wpa_cli;

pub use simulated::{SimulatedBehavior, SimulatedCall, SimulatedGroupService};
pub use wpa_cli::WpaCliGroupService;
