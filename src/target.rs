//! Output buffer shared by the region writer threads of one frame
//!
//! The writers touch disjoint source cells, but the destinations of the
//! resampled arm and the translated hand can land on cells the body pass
//! also writes. Every cell is therefore an atomic word: a cell written by
//! more than one region ends up with whichever store came last. That
//! outcome is not deterministic; the optional `WriteLedger` counts such
//! cells so they show up in the frame report.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::classify::ArmRegion;
use crate::frame::{with_alpha, Dimensions, OutputBuffer};

const _: () = assert!(std::mem::size_of::<AtomicU32>() == std::mem::size_of::<u32>());
const _: () = assert!(std::mem::align_of::<AtomicU32>() == std::mem::align_of::<u32>());

const REGIONS: usize = 3;

#[inline]
const fn region_slot(region: ArmRegion) -> usize {
    match region {
        ArmRegion::Body => 0,
        ArmRegion::Forearm => 1,
        ArmRegion::Hand => 2,
    }
}

const fn region_bit(region: ArmRegion) -> u8 {
    1 << region_slot(region)
}

/// View a pixel slice as atomics for the duration of the borrow
fn as_atomic(cells: &mut [u32]) -> &[AtomicU32] {
    // Safety: AtomicU32 has the same size and bit validity as u32 and, as
    // asserted above, the same alignment. The exclusive borrow guarantees no
    // non-atomic access to these cells while the shared view is alive.
    unsafe { &*(cells as *mut [u32] as *const [AtomicU32]) }
}

/// Frame-scoped atomic view of the output buffer
pub struct SharedTarget<'a> {
    cells: &'a [AtomicU32],
    dims: Dimensions,
    ledger: Option<&'a WriteLedger>,
}

impl<'a> SharedTarget<'a> {
    pub fn new(output: &'a mut OutputBuffer, ledger: Option<&'a WriteLedger>) -> Self {
        let dims = output.dims();
        Self {
            cells: as_atomic(output.as_mut_slice()),
            dims,
            ledger,
        }
    }

    #[inline]
    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    /// Handle for one region's writer thread
    pub fn writer(&self, region: ArmRegion) -> RegionWriter<'_> {
        RegionWriter {
            cells: self.cells,
            dims: self.dims,
            ledger: self.ledger,
            region,
        }
    }
}

/// Write access for one region; cheap to copy into a worker thread
#[derive(Clone, Copy)]
pub struct RegionWriter<'t> {
    cells: &'t [AtomicU32],
    dims: Dimensions,
    ledger: Option<&'t WriteLedger>,
    region: ArmRegion,
}

impl<'t> RegionWriter<'t> {
    #[inline]
    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    #[inline]
    pub fn region(&self) -> ArmRegion {
        self.region
    }

    /// Composite `src` into cell `idx`; false when `idx` is outside the grid
    #[inline]
    pub fn composite(&self, idx: usize, src: u32, alpha: u8) -> bool {
        match self.cells.get(idx) {
            Some(cell) => {
                cell.store(with_alpha(src, alpha), Ordering::Relaxed);
                self.note_write(idx);
                true
            },
            None => false,
        }
    }

    /// Composite at signed coordinates, rejecting anything off the grid
    #[inline]
    pub fn composite_at(&self, x: i64, y: i64, src: u32, alpha: u8) -> bool {
        match self.dims.checked_index(x, y) {
            Some(idx) => self.composite(idx, src, alpha),
            None => false,
        }
    }

    /// Composite without a bounds check.
    ///
    /// # Safety
    /// `idx` must be less than `self.dims().len()`.
    #[inline]
    pub unsafe fn composite_unchecked(&self, idx: usize, src: u32, alpha: u8) {
        debug_assert!(idx < self.cells.len());
        self.cells
            .get_unchecked(idx)
            .store(with_alpha(src, alpha), Ordering::Relaxed);
        self.note_write(idx);
    }

    /// Record that this region marked source cell `idx` visited
    #[inline]
    pub fn note_mark(&self, idx: usize) {
        if let Some(ledger) = self.ledger {
            ledger.record_mark(self.region, idx);
        }
    }

    #[inline]
    fn note_write(&self, idx: usize) {
        if let Some(ledger) = self.ledger {
            ledger.record_write(self.region, idx);
        }
    }
}

/// Per-cell audit of one frame: how often each region marked a source cell
/// visited, and which regions wrote each destination cell.
#[derive(Debug, Default)]
pub struct WriteLedger {
    dims: Option<Dimensions>,
    marks: [Vec<AtomicU8>; REGIONS],
    writers: Vec<AtomicU8>,
}

/// Totals derived from a `WriteLedger`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    /// Highest number of visited marks any region put on one source cell
    pub max_marks: u8,
    /// Source cells marked by more than one region
    pub cross_region_marks: usize,
    /// Destination cells written by more than one region
    pub overlaps: usize,
}

impl WriteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every counter and size for a grid
    pub fn reset(&mut self, dims: Dimensions) {
        let len = dims.len();
        for marks in &mut self.marks {
            marks.resize_with(len, AtomicU8::default);
            marks.iter_mut().for_each(|m| *m.get_mut() = 0);
        }
        self.writers.resize_with(len, AtomicU8::default);
        self.writers.iter_mut().for_each(|w| *w.get_mut() = 0);
        self.dims = Some(dims);
    }

    #[inline]
    fn record_mark(&self, region: ArmRegion, idx: usize) {
        if let Some(m) = self.marks[region_slot(region)].get(idx) {
            m.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    fn record_write(&self, region: ArmRegion, idx: usize) {
        if let Some(w) = self.writers.get(idx) {
            w.fetch_or(region_bit(region), Ordering::Relaxed);
        }
    }

    /// Times `region` marked source cell `idx` visited
    pub fn marks(&self, region: ArmRegion, idx: usize) -> u8 {
        self.marks[region_slot(region)]
            .get(idx)
            .map_or(0, |m| m.load(Ordering::Relaxed))
    }

    /// Whether `region` wrote destination cell `idx`
    pub fn written_by(&self, region: ArmRegion, idx: usize) -> bool {
        self.writers
            .get(idx)
            .is_some_and(|w| w.load(Ordering::Relaxed) & region_bit(region) != 0)
    }

    /// Source cells `region` marked, in index order
    pub fn marked_cells(&self, region: ArmRegion) -> impl Iterator<Item = usize> + '_ {
        self.marks[region_slot(region)]
            .iter()
            .enumerate()
            .filter(|(_, m)| m.load(Ordering::Relaxed) > 0)
            .map(|(i, _)| i)
    }

    pub fn summary(&self) -> LedgerSummary {
        let len = self.writers.len();
        let mut summary = LedgerSummary::default();
        for idx in 0..len {
            let mut regions = 0;
            for marks in &self.marks {
                let m = marks[idx].load(Ordering::Relaxed);
                summary.max_marks = summary.max_marks.max(m);
                if m > 0 {
                    regions += 1;
                }
            }
            if regions > 1 {
                summary.cross_region_marks += 1;
            }
            if self.writers[idx].load(Ordering::Relaxed).count_ones() > 1 {
                summary.overlaps += 1;
            }
        }
        summary
    }
}
