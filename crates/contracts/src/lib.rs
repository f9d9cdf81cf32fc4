//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Identity Model
//! - `Event::id` is the cross-store identity (schedule match number)
//! - `RecordKey` is the store-native handle used to address updates and deletes
//!
//! ## Time Model
//! - Datetimes are timezone-aware and normalised to the configured reference zone
//!   before any comparison

mod blueprint;
mod error;
mod event;
mod lookup;
mod mirror;
mod plan;
mod provider;
mod record;
mod report;

pub use blueprint::*;
pub use error::*;
pub use event::*;
pub use lookup::{ArenaTable, ContactBook};
pub use mirror::{LocalMirror, Mirror, NoMirror};
pub use plan::*;
pub use provider::{Capabilities, LocalProvider, Provider};
pub use record::*;
pub use report::RunReport;
