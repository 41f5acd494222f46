//! # voq-sched
//!
//! Per-slot matching engine for input-queued crossbar switches with virtual
//! output queues.
//!
//! ## Architecture
//!
//! - **Types**: VOQ matrix, schedules, slot receipts and trace roots
//! - **Sampling**: weight policies and the queue-proportional sampler
//! - **Engine**: the `Scheduler` contract, every matching heuristic, and the
//!   cycle-merge combinator
//! - **Config**: scheduler selection by name and construction parameters
//!
//! ## Design Principles
//!
//! 1. **Determinism**: same seed and same VOQ snapshots give byte-identical
//!    schedule sequences
//! 2. **Bounded work**: every scheduler does a fixed number of O(N) or
//!    O(N²) passes per slot
//! 3. **Reused buffers**: scratch state is sized once at construction; the
//!    matching checks and `fill_unmatched` still take a short-lived
//!    N-entry bitmap per slot
//! 4. **Synchronous execution**: `run` never blocks
//!
//! ## Quick start
//!
//! ```
//! use voq_sched::{Schedule, SchedulerConfig, SchedulerKind, VoqMatrix};
//!
//! let voqs = VoqMatrix::from_rows(&[vec![5, 0], vec![0, 3]]).unwrap();
//! let mut islip = SchedulerConfig::new(2).build(SchedulerKind::Islip).unwrap();
//! let mut schedule = Schedule::new(2);
//!
//! islip.run(&voqs, &mut schedule);
//! assert_eq!(schedule.as_slice(), &[Some(0), Some(1)]);
//! ```

// ============================================================================
// Module declarations
// ============================================================================

/// Construction errors
pub mod error;

/// Core data types: VoqMatrix, Schedule, SlotReceipt
pub mod types;

/// Weight policies and weighted sampling
pub mod sampling;

/// Schedulers and the cycle-merge combinator
pub mod engine;

/// Scheduler selection and parameters
pub mod config;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use config::{SchedulerConfig, SchedulerKind};
pub use engine::{CycleMerge, Scheduler};
pub use error::ConfigError;
pub use sampling::{WeightPolicy, WeightedSampler};
pub use types::{Schedule, ScheduleTrace, SlotReceipt, VoqMatrix};
