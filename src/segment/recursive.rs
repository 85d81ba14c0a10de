//! Native recursion, one call frame per claimed cell
//!
//! Depth grows with the size of the filled component, so the worst case is
//! one level per grid cell. The caller runs this on a thread whose stack is
//! sized by `recursion_stack_size`, and the fill refuses to go deeper than
//! the budget it was given instead of overflowing.

use super::{Fill, FillVisitor};
use crate::error::{CompositeError, Result};

/// Stack reserved per recursion level
pub const BYTES_PER_LEVEL: usize = if cfg!(debug_assertions) { 1024 } else { 256 };

/// Headroom for everything below the first fill frame
const BASE_STACK: usize = 2 * 1024 * 1024;

/// Thread stack size that fits `levels` recursion levels
pub fn recursion_stack_size(levels: usize) -> usize {
    levels.saturating_mul(BYTES_PER_LEVEL).saturating_add(BASE_STACK)
}

pub(super) fn fill<V: FillVisitor>(
    fill: &mut Fill<'_, '_, V>,
    x: usize,
    y: usize,
    budget: usize,
) -> Result<()> {
    visit(fill, x, y, 1, budget)
}

fn visit<V: FillVisitor>(
    fill: &mut Fill<'_, '_, V>,
    x: usize,
    y: usize,
    depth: usize,
    budget: usize,
) -> Result<()> {
    let idx = fill.dims.index(x, y);
    if !fill.claimable(x, y, idx) {
        return Ok(());
    }
    if depth > budget {
        return Err(CompositeError::RecursionBudget { budget });
    }
    fill.claim(x, y, idx);
    fill.note_pending(depth);

    for &offset in fill.offsets {
        if let Some((nx, ny, _)) = fill.neighbor(x, y, offset) {
            visit(fill, nx, ny, depth + 1, budget)?;
        }
    }
    Ok(())
}
