//! Transfer engine module
//!
//! Orchestrates deposits, withdrawals and transfers. Each operation loads the
//! accounts it touches, applies balance deltas through the mutator, and
//! commits every change plus one ledger entry as a single unit of work.

mod commands;
pub mod mutator;
mod transfer;


pub use commands::*;
pub use transfer::TransferEngine;
