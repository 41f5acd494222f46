//! Virtual output queue occupancy.
//!
//! ## Layout
//!
//! The N×N matrix is stored row-major in one flat `Vec<u64>`:
//! cell `(i, k)` lives at `i * N + k` and counts the packets waiting at
//! input `i` for output `k`. Rows are handed to the sampler as plain slices.
//!
//! ## Arrivals
//!
//! The driver records the current slot's fresh arrivals through
//! [`VoqMatrix::enqueue`]. Each input can carry at most one arrival per slot
//! (the last one recorded wins). Schedulers that need arrival information
//! (the arrival-greedy proposal) read it through [`VoqMatrix::arrival`];
//! everything else only sees queue lengths.

use crate::error::ConfigError;
use crate::types::Schedule;

/// N×N queue-length matrix owned by the switch driver.
///
/// ## Example
///
/// ```
/// use voq_sched::types::VoqMatrix;
///
/// let mut voqs = VoqMatrix::new(2);
/// voqs.enqueue(0, 1);
/// voqs.enqueue(0, 1);
///
/// assert_eq!(voqs.get(0, 1), 2);
/// assert_eq!(voqs.arrival(0), Some(1));
/// assert_eq!(voqs.total_backlog(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoqMatrix {
    /// Port count N
    ports: usize,

    /// Row-major queue lengths, `ports * ports` cells
    cells: Vec<u64>,

    /// Output of the arrival recorded at each input during the current slot
    arrivals: Vec<Option<usize>>,
}

impl VoqMatrix {
    /// Create an all-empty matrix for `ports` ports.
    pub fn new(ports: usize) -> Self {
        Self {
            ports,
            cells: vec![0; ports * ports],
            arrivals: vec![None; ports],
        }
    }

    /// Build a matrix from explicit rows.
    ///
    /// # Errors
    ///
    /// `ZeroPorts` for an empty input, `PortMismatch` if any row length
    /// differs from the number of rows.
    ///
    /// # Example
    ///
    /// ```
    /// use voq_sched::types::VoqMatrix;
    ///
    /// let voqs = VoqMatrix::from_rows(&[vec![5, 0], vec![0, 3]]).unwrap();
    /// assert_eq!(voqs.get(1, 1), 3);
    /// assert!(VoqMatrix::from_rows(&[vec![1, 2], vec![3]]).is_err());
    /// ```
    pub fn from_rows(rows: &[Vec<u64>]) -> Result<Self, ConfigError> {
        let ports = rows.len();
        if ports == 0 {
            return Err(ConfigError::ZeroPorts);
        }

        let mut voqs = Self::new(ports);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != ports {
                return Err(ConfigError::PortMismatch {
                    expected: ports,
                    found: row.len(),
                });
            }
            voqs.cells[i * ports..(i + 1) * ports].copy_from_slice(row);
        }
        Ok(voqs)
    }

    // ========================================================================
    // Queue access
    // ========================================================================

    /// Number of input (and output) ports
    #[inline]
    pub fn port_count(&self) -> usize {
        self.ports
    }

    /// Queue length from input `i` to output `k`
    #[inline]
    pub fn get(&self, i: usize, k: usize) -> u64 {
        self.cells[i * self.ports + k]
    }

    /// Overwrite the queue length from input `i` to output `k`
    #[inline]
    pub fn set(&mut self, i: usize, k: usize, len: u64) {
        self.cells[i * self.ports + k] = len;
    }

    /// All queue lengths of input `i`, indexed by output
    #[inline]
    pub fn row(&self, i: usize) -> &[u64] {
        &self.cells[i * self.ports..(i + 1) * self.ports]
    }

    /// Sum of all queue lengths
    pub fn total_backlog(&self) -> u64 {
        self.cells.iter().sum()
    }

    /// Check whether every queue is empty
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|&len| len == 0)
    }

    // ========================================================================
    // Driver helpers
    // ========================================================================

    /// Forget the previous slot's arrivals.
    pub fn begin_slot(&mut self) {
        self.arrivals.fill(None);
    }

    /// Add one packet from input `i` to output `k` and record it as the
    /// current slot's arrival at `i`.
    pub fn enqueue(&mut self, i: usize, k: usize) {
        self.cells[i * self.ports + k] += 1;
        self.arrivals[i] = Some(k);
    }

    /// Output of the arrival recorded at input `i` this slot, if any
    #[inline]
    pub fn arrival(&self, i: usize) -> Option<usize> {
        self.arrivals[i]
    }

    /// Dequeue one packet for every matched pair with a non-empty queue.
    ///
    /// # Returns
    ///
    /// The number of packets that left the switch.
    pub fn depart(&mut self, schedule: &Schedule) -> usize {
        let mut departed = 0;
        for (i, k) in schedule.pairs() {
            let cell = &mut self.cells[i * self.ports + k];
            if *cell > 0 {
                *cell -= 1;
                departed += 1;
            }
        }
        departed
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
