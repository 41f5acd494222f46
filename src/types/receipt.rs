//! Per-slot receipts and the rolling schedule trace.
//!
//! A [`SlotReceipt`] summarizes one call to `Scheduler::run`: how many ports
//! were matched, the total queue weight served, and a SHA-256 of the schedule
//! itself. A [`ScheduleTrace`] folds receipts into a single 32-byte root so
//! two runs can be compared for bit-identical behavior without storing every
//! schedule.
//!
//! ## SSZ Layout
//!
//! Receipts derive `SimpleSerialize` and encode to a fixed 64-byte container:
//! slot (8) + matched_ports (8) + matched_weight (8) + schedule_root (32) +
//! full (8).

use ssz_rs::prelude::*;
use sha2::{Sha256, Digest};

use crate::types::{Schedule, VoqMatrix};

/// Summary of one scheduling slot.
///
/// ## Example
///
/// ```
/// use voq_sched::types::{Schedule, SlotReceipt, VoqMatrix};
///
/// let voqs = VoqMatrix::from_rows(&[vec![5, 0], vec![0, 3]]).unwrap();
/// let receipt = SlotReceipt::record(7, &Schedule::identity(2), &voqs);
///
/// assert_eq!(receipt.slot, 7);
/// assert_eq!(receipt.matched_ports, 2);
/// assert_eq!(receipt.matched_weight, 8);
/// assert!(receipt.is_full());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
pub struct SlotReceipt {
    /// Time slot index supplied by the driver
    pub slot: u64,

    /// Number of inputs matched by the schedule
    pub matched_ports: u64,

    /// Sum of queue lengths over the matched pairs
    pub matched_weight: u64,

    /// SHA-256 of the schedule (see `Schedule::digest`)
    pub schedule_root: [u8; 32],

    /// 1 if the schedule was a full matching, 0 otherwise
    /// Stored as u64 to keep the container 8-byte aligned
    pub full: u64,
}

impl SlotReceipt {
    /// Summarize `schedule` as served against `voqs` in `slot`
    pub fn record(slot: u64, schedule: &Schedule, voqs: &VoqMatrix) -> Self {
        Self {
            slot,
            matched_ports: schedule.matched_count() as u64,
            matched_weight: schedule.weight(voqs),
            schedule_root: schedule.digest(),
            full: u64::from(schedule.is_full_matching()),
        }
    }

    /// Whether the recorded schedule was a full matching
    pub fn is_full(&self) -> bool {
        self.full != 0
    }

    /// Get the schedule root as a hex string
    pub fn schedule_root_hex(&self) -> String {
        hex::encode(self.schedule_root)
    }
}

/// Rolling SHA-256 over a sequence of slot receipts.
///
/// `root' = SHA-256(root || ssz(receipt))`, starting from 32 zero bytes.
#[derive(Debug, Clone, Default)]
pub struct ScheduleTrace {
    root: [u8; 32],
    slots: u64,
    matched_ports: u64,
    matched_weight: u64,
}

impl ScheduleTrace {
    /// Create an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the schedule chosen for the next slot and fold it into the root.
    pub fn record(&mut self, schedule: &Schedule, voqs: &VoqMatrix) -> SlotReceipt {
        let receipt = SlotReceipt::record(self.slots, schedule, voqs);
        self.absorb(&receipt);
        receipt
    }

    /// Fold an externally built receipt into the root.
    pub fn absorb(&mut self, receipt: &SlotReceipt) {
        // Fixed-size container of basic types; encoding cannot fail.
        let encoded = ssz_rs::serialize(receipt).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(self.root);
        hasher.update(&encoded);
        let result = hasher.finalize();
        self.root.copy_from_slice(&result);

        self.slots += 1;
        self.matched_ports += receipt.matched_ports;
        self.matched_weight += receipt.matched_weight;
    }

    /// Current trace root
    pub fn root(&self) -> [u8; 32] {
        self.root
    }

    /// Current trace root as a hex string
    pub fn root_hex(&self) -> String {
        hex::encode(self.root)
    }

    /// Number of slots recorded
    pub fn slots(&self) -> u64 {
        self.slots
    }

    /// Average matched ports per slot, or None before the first slot
    pub fn mean_matched_ports(&self) -> Option<f64> {
        if self.slots == 0 {
            None
        } else {
            Some(self.matched_ports as f64 / self.slots as f64)
        }
    }

    /// Total queue weight served across all recorded slots
    pub fn matched_weight(&self) -> u64 {
        self.matched_weight
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
