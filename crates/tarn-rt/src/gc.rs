//! The collector pair.
//!
//! Reclamation is split between two cooperating collectors that share one
//! release routine:
//!
//! - the **minor** collector sweeps the candidate list deposited by
//!   [`Context::decref`] zero-crossings. It is cheap and local but blind
//!   to cycles;
//! - the **major** collector is a full mark-and-sweep over the heap,
//!   rooted in the variable table. With a non-negative step budget it
//!   runs as a resumable state machine, one bounded phase-step per call,
//!   so the embedder can spread a collection across its own loop.

use hashbrown::HashSet;
use tarn_core::{AllocId, Value};
use tracing::{debug, trace};

use crate::context::Context;

/// Phase of the major collection cycle. `Idle` doubles as "no cycle in
/// flight": the next call initializes the scratch buffers and advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum MajorPhase {
    #[default]
    Idle,
    ClearMarks,
    Seed,
    Transfer,
    Visit,
    Swap,
}

/// Cumulative collector counters, readable via [`Context::metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcMetrics {
    pub minor_collections: u64,
    pub major_collections: u64,
    /// Cells destroyed by either collector.
    pub cells_released: u64,
}

/// Scratch state of the major collector. Held by the context so a
/// budgeted cycle can be resumed by a later `major_gc` call; the buffers
/// keep their capacity across cycles.
#[derive(Debug, Default)]
pub(crate) struct MajorGcState {
    pub(crate) phase: MajorPhase,
    visited: HashSet<AllocId>,
    next: HashSet<AllocId>,
    fresh: HashSet<AllocId>,
    /// Snapshot of the frontier currently being visited. A plain vector,
    /// so the resume cursors below stay meaningful even when the hash
    /// sets are mutated between budgeted calls.
    frontier: Vec<AllocId>,
    /// Cursor: index into `frontier` of the cell under examination.
    last_handle: usize,
    /// Cursor: index of the next unexamined slot of that cell.
    last_handle_entry: usize,
}

impl MajorGcState {
    fn reset(&mut self) {
        self.phase = MajorPhase::Idle;
        self.visited.clear();
        self.next.clear();
        self.fresh.clear();
        self.frontier.clear();
        self.last_handle = 0;
        self.last_handle_entry = 0;
    }
}

impl Context {
    // ── Minor collection ──────────────────────────────────────────────

    /// Sweep the candidate list: release every hinted cell whose refcount
    /// is still at or below zero. Candidates are hints, not facts: stale
    /// entries (already reclaimed by a major cycle) and duplicates are
    /// skipped. Cycles are not detected here.
    pub fn minor_gc(&mut self) {
        // Take the list first: candidates pushed while releasing (by the
        // decouple pass) must survive for the next minor collection.
        let candidates = std::mem::take(&mut self.gc_candidates);
        let mut garbage: Vec<AllocId> = Vec::with_capacity(candidates.len());
        for id in candidates {
            match self.heap.get(&id) {
                Some(cell) if cell.ref_count <= 0 => garbage.push(id),
                _ => {}
            }
        }
        // The same cell may have crossed zero more than once; release
        // each at most once or the decouple pass would double-decref.
        garbage.sort_unstable();
        garbage.dedup();

        let released = self.release_garbage(&garbage);
        self.metrics.minor_collections += 1;
        if released > 0 {
            debug!(released, "minor gc released cells");
        }
    }

    // ── Major collection ──────────────────────────────────────────────

    /// Full mark-and-sweep from the variable table.
    ///
    /// `max_steps = -1` runs the cycle to completion synchronously. A
    /// non-negative budget instead advances the resumable state machine
    /// by one phase-step and returns: the mark phase performs at most
    /// `max_steps` slot examinations, resuming mid-frontier on the next
    /// call, while the other phases complete in one call each. Sweep and
    /// finalization piggyback on the step that finds the frontier empty
    /// and are never work-bounded.
    ///
    /// The root set is the one sampled when the cycle's seed step ran;
    /// between budgeted calls the embedder may operate on the context
    /// freely, but cells allocated mid-cycle survive only if written
    /// into a cell the cycle has not yet expanded.
    ///
    /// Never fails, and is idempotent on a context with no garbage.
    pub fn major_gc(&mut self, max_steps: i64) {
        let incremental = max_steps >= 0;
        let mut budget = incremental.then_some(max_steps);

        loop {
            match self.major.phase {
                MajorPhase::Idle => {
                    self.major.reset();
                    self.major.phase = MajorPhase::ClearMarks;
                    trace!("major gc cycle started");
                }
                MajorPhase::ClearMarks => {
                    for cell in self.heap.values_mut() {
                        cell.clear_mark();
                    }
                    self.major.phase = MajorPhase::Seed;
                }
                MajorPhase::Seed => {
                    let major = &mut self.major;
                    for value in self.variables.values() {
                        if let Value::Handle(id) = value {
                            major.next.insert(*id);
                        }
                    }
                    major.phase = MajorPhase::Transfer;
                }
                MajorPhase::Transfer => {
                    if self.major.next.is_empty() {
                        // Mark reached its fixed point; sweep and
                        // finalize in this same call.
                        self.sweep_and_finalize();
                        return;
                    }
                    let major = &mut self.major;
                    major.frontier.clear();
                    major.frontier.extend(major.next.drain());
                    major.visited.extend(major.frontier.iter().copied());
                    major.last_handle = 0;
                    major.last_handle_entry = 0;
                    major.phase = MajorPhase::Visit;
                }
                MajorPhase::Visit => {
                    if !self.visit_frontier(&mut budget) {
                        trace!("major gc budget exhausted mid-frontier");
                        return;
                    }
                    self.major.phase = MajorPhase::Swap;
                }
                MajorPhase::Swap => {
                    let major = &mut self.major;
                    std::mem::swap(&mut major.next, &mut major.fresh);
                    major.fresh.clear();
                    major.phase = MajorPhase::Transfer;
                }
            }
            if incremental {
                return;
            }
        }
    }

    /// Whether a budgeted major cycle is mid-flight.
    pub fn major_in_progress(&self) -> bool {
        self.major.phase != MajorPhase::Idle
    }

    /// Mark every frontier cell and gather its not-yet-visited handle
    /// slots into the fresh frontier. Consumes one budget unit per slot
    /// examined; returns `false` when the budget runs out, with the
    /// cursors left on the exact unexamined slot. Cells the minor
    /// collector freed between calls are skipped.
    fn visit_frontier(&mut self, budget: &mut Option<i64>) -> bool {
        while self.major.last_handle < self.major.frontier.len() {
            let id = self.major.frontier[self.major.last_handle];
            match self.heap.get_mut(&id) {
                Some(cell) => cell.set_mark(),
                None => {
                    self.major.last_handle += 1;
                    self.major.last_handle_entry = 0;
                    continue;
                }
            }
            loop {
                let slot = self.major.last_handle_entry;
                // Re-resolve each step: a pop between budgeted calls may
                // have shrunk the cell under the cursor.
                let value = match self.heap.get(&id) {
                    Some(cell) if slot < cell.data.len() => cell.data[slot],
                    _ => break,
                };
                if let Some(steps) = budget.as_mut() {
                    if *steps == 0 {
                        return false;
                    }
                    *steps -= 1;
                }
                self.major.last_handle_entry += 1;
                if let Value::Handle(target) = value {
                    if !self.major.visited.contains(&target) {
                        self.major.fresh.insert(target);
                    }
                }
            }
            self.major.last_handle += 1;
            self.major.last_handle_entry = 0;
        }
        true
    }

    /// Collect every unmarked cell, release the batch, clear survivor
    /// marks, and return the machine to `Idle`.
    fn sweep_and_finalize(&mut self) {
        let mut garbage: Vec<AllocId> = Vec::new();
        for (&id, cell) in &self.heap {
            if !cell.is_marked() {
                garbage.push(id);
            }
        }
        let released = self.release_garbage(&garbage);

        for cell in self.heap.values_mut() {
            cell.clear_mark();
        }
        self.major.reset();
        self.metrics.major_collections += 1;
        debug!(released, survivors = self.heap.len(), "major gc complete");
    }

    // ── Shared release ────────────────────────────────────────────────

    /// Release a garbage batch in two passes: first decouple every batch
    /// member (decref each handle slot whose target is still present),
    /// then destroy them all. Decoupling the whole batch before any
    /// destruction means two batch members pointing at each other never
    /// observe a stale identifier. Candidates pushed while decoupling are
    /// left for the next minor collection.
    pub(crate) fn release_garbage(&mut self, garbage: &[AllocId]) -> u64 {
        for &id in garbage {
            let Some(cell) = self.heap.get_mut(&id) else {
                continue;
            };
            let data = std::mem::take(&mut cell.data);
            for value in data {
                self.decref(value);
            }
        }
        let mut released = 0;
        for &id in garbage {
            if self.heap.remove(&id).is_some() {
                released += 1;
            }
        }
        self.metrics.cells_released += released;
        released
    }
}
