//! Single pass over every cell in row-major order

use super::{Fill, FillVisitor};

pub(super) fn scan<V: FillVisitor>(fill: &mut Fill<'_, '_, V>) {
    let width = fill.dims.width;
    for y in 0..fill.dims.height {
        let row = y * width;
        for x in 0..width {
            let idx = row + x;
            if fill.claimable(x, y, idx) {
                fill.claim(x, y, idx);
            }
        }
    }
}
