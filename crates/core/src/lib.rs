//! Domain logic for the piecework microtask platform.
//!
//! Everything in this crate is pure computation: template processing,
//! CSV parsing and assembly, skip-list session state, and work-time
//! statistics. Persistence lives in `piecework-db`, HTTP in
//! `piecework-api`.

pub mod csv_input;
pub mod error;
pub mod export;
pub mod session;
pub mod stats;
pub mod template;
pub mod types;
pub mod worker;
