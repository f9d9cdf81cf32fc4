//! # Providers
//!
//! Store adapters behind the `Provider` trait.
//!
//! - `schedule`: read-only league schedule feed
//! - `google`: calendar and table stores
//! - `cache`: JSON snapshot file, also used as the display mirror
//! - `memory`: in-memory store with a call journal, for tests and dry runs
//!
//! Transport errors stay inside this crate as [`HttpError`] and are mapped to
//! `ContractError` at the provider boundary.

pub mod cache;
pub mod error;
pub mod factory;
pub mod google;
mod http;
pub mod memory;
pub mod schedule;

pub use cache::{CacheProvider, CACHE_PROVIDER};
pub use error::HttpError;
pub use factory::{AnyMirror, AnyProvider, ProviderKind};
pub use google::{
    refresh_credentials, CalendarCodec, CalendarProvider, SheetCodec, TableProvider,
    CALENDAR_PROVIDER, TABLE_PROVIDER,
};
pub use memory::{Call, Journal, MemoryProvider, Operation};
pub use schedule::{ScheduleCodec, ScheduleProvider, SCHEDULE_PROVIDER};
