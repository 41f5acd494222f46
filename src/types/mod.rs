//! Core data types shared by every scheduler.
//!
//! ## Types
//!
//! - [`VoqMatrix`]: N×N queue lengths plus the slot's fresh arrivals
//! - [`Schedule`]: input-to-output assignment for one slot
//! - [`SlotReceipt`]: SSZ-encoded summary of one slot
//! - [`ScheduleTrace`]: rolling SHA-256 root over slot receipts
//!
//! Queue lengths are plain `u64` counts; the engine never looks at packets.

mod voq;
mod schedule;
mod receipt;

pub use voq::VoqMatrix;
pub use schedule::Schedule;
pub use receipt::{SlotReceipt, ScheduleTrace};
