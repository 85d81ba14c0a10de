//! Scanline ("linefill") flood fill
//!
//! Each step claims a maximal horizontal run of claimable cells and queues
//! it as a `FloodFillRange`. Popping a range probes the rows directly above
//! and below across the run's columns (one column wider on each side for
//! eight-connectivity) and starts a new run at every claimable cell found.

use std::collections::VecDeque;

use super::{Fill, FillVisitor};

/// A maximal run of claimed cells on one row, `start_x..=end_x`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloodFillRange {
    pub start_x: usize,
    pub end_x: usize,
    pub y: usize,
}

impl FloodFillRange {
    /// Number of cells in the run
    pub fn width(&self) -> usize {
        self.end_x - self.start_x + 1
    }
}

/// FIFO of runs waiting for vertical expansion
#[derive(Debug, Default)]
pub struct FloodFillRangeQueue {
    ranges: VecDeque<FloodFillRange>,
}

impl FloodFillRangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, range: FloodFillRange) {
        self.ranges.push_back(range);
    }

    pub fn dequeue(&mut self) -> Option<FloodFillRange> {
        self.ranges.pop_front()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    pub fn reserve(&mut self, additional: usize) {
        self.ranges.reserve(additional);
    }
}

/// Fill the component containing `(x, y)`; the caller checked it is claimable
pub(super) fn fill<V: FillVisitor>(
    fill: &mut Fill<'_, '_, V>,
    queue: &mut FloodFillRangeQueue,
    x: usize,
    y: usize,
) {
    let diagonal = fill.offsets.len() == 8;
    let last_x = fill.dims.width - 1;

    let first = linear_fill(fill, x, y);
    queue.enqueue(first);
    fill.note_pending(queue.len());

    while let Some(range) = queue.dequeue() {
        let (lo, hi) = if diagonal {
            (range.start_x.saturating_sub(1), (range.end_x + 1).min(last_x))
        } else {
            (range.start_x, range.end_x)
        };
        let above = range.y.checked_sub(1);
        let below = Some(range.y + 1).filter(|&row| row < fill.dims.height);
        for row in [above, below].into_iter().flatten() {
            let mut cx = lo;
            while cx <= hi {
                let idx = fill.dims.index(cx, row);
                if fill.claimable(cx, row, idx) {
                    let run = linear_fill(fill, cx, row);
                    queue.enqueue(run);
                    cx = run.end_x + 1;
                } else {
                    cx += 1;
                }
            }
        }
        fill.note_pending(queue.len());
    }
}

/// Claim the maximal run through `(x, y)`
fn linear_fill<V: FillVisitor>(fill: &mut Fill<'_, '_, V>, x: usize, y: usize) -> FloodFillRange {
    let row = y * fill.dims.width;
    fill.claim(x, y, row + x);

    let mut start_x = x;
    while start_x > 0 && fill.claimable(start_x - 1, y, row + start_x - 1) {
        start_x -= 1;
        fill.claim(start_x, y, row + start_x);
    }

    let mut end_x = x;
    while end_x + 1 < fill.dims.width && fill.claimable(end_x + 1, y, row + end_x + 1) {
        end_x += 1;
        fill.claim(end_x, y, row + end_x);
    }

    FloodFillRange { start_x, end_x, y }
}
