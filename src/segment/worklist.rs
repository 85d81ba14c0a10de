//! Explicit-worklist fills: a stack gives depth-first order, a FIFO queue
//! breadth-first. Cells are claimed when pushed, so a cell is never queued
//! twice and the list never holds more entries than the grid has cells.

use std::collections::VecDeque;

use super::{Fill, FillVisitor};

/// Pending cells of an iterative fill
pub(super) trait Worklist {
    fn put(&mut self, idx: usize);
    fn take(&mut self) -> Option<usize>;
    fn pending(&self) -> usize;
}

impl Worklist for Vec<usize> {
    #[inline]
    fn put(&mut self, idx: usize) {
        self.push(idx);
    }

    #[inline]
    fn take(&mut self) -> Option<usize> {
        self.pop()
    }

    #[inline]
    fn pending(&self) -> usize {
        self.len()
    }
}

impl Worklist for VecDeque<usize> {
    #[inline]
    fn put(&mut self, idx: usize) {
        self.push_back(idx);
    }

    #[inline]
    fn take(&mut self) -> Option<usize> {
        self.pop_front()
    }

    #[inline]
    fn pending(&self) -> usize {
        self.len()
    }
}

/// Fill the component containing `(x, y)`; the caller checked it is claimable
pub(super) fn fill<V: FillVisitor, W: Worklist>(
    fill: &mut Fill<'_, '_, V>,
    list: &mut W,
    x: usize,
    y: usize,
) {
    let idx = fill.dims.index(x, y);
    fill.claim(x, y, idx);
    list.put(idx);
    fill.note_pending(list.pending());

    while let Some(idx) = list.take() {
        let (cx, cy) = fill.dims.coords(idx);
        for &offset in fill.offsets {
            if let Some((nx, ny, n)) = fill.neighbor(cx, cy, offset) {
                if fill.claimable(nx, ny, n) {
                    fill.claim(nx, ny, n);
                    list.put(n);
                }
            }
        }
        fill.note_pending(list.pending());
    }
}
