//! Flood-fill traversal over a body-presence grid
//!
//! Five interchangeable strategies walk the same grid and claim the same
//! set of cells; they differ only in order and in how much pending work
//! they hold at once:
//!
//! - `Sequential`: one pass over every cell, no seed
//! - `RecursiveDfs`: native recursion from the seed, bounded by a depth budget
//! - `IterativeDfs`: explicit stack
//! - `IterativeBfs`: explicit FIFO queue
//! - `Scanline`: horizontal runs queued for expansion above and below
//!
//! A cell is claimable when its mask value is still a body id and the
//! visitor accepts it. Claiming marks the cell visited before the visitor
//! sees it, so every cell is visited at most once per pass.

mod recursive;
mod scanline;
mod sequential;
mod worklist;

pub use recursive::{recursion_stack_size, BYTES_PER_LEVEL};
pub use scanline::{FloodFillRange, FloodFillRangeQueue};

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::Result;
use crate::frame::{is_body, mark_visited, Dimensions};

/// Traversal order used to walk the body mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalStrategy {
    Sequential,
    RecursiveDfs,
    IterativeDfs,
    IterativeBfs,
    #[default]
    Scanline,
}

impl TraversalStrategy {
    pub const ALL: [TraversalStrategy; 5] = [
        TraversalStrategy::Sequential,
        TraversalStrategy::RecursiveDfs,
        TraversalStrategy::IterativeDfs,
        TraversalStrategy::IterativeBfs,
        TraversalStrategy::Scanline,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TraversalStrategy::Sequential => "sequential",
            TraversalStrategy::RecursiveDfs => "recursive_dfs",
            TraversalStrategy::IterativeDfs => "iterative_dfs",
            TraversalStrategy::IterativeBfs => "iterative_bfs",
            TraversalStrategy::Scanline => "scanline",
        }
    }

    /// Accepts the config spelling plus a few short aliases
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sequential" | "seq" => Some(TraversalStrategy::Sequential),
            "recursive_dfs" | "recursive" | "rec" => Some(TraversalStrategy::RecursiveDfs),
            "iterative_dfs" | "dfs" => Some(TraversalStrategy::IterativeDfs),
            "iterative_bfs" | "bfs" => Some(TraversalStrategy::IterativeBfs),
            "scanline" | "linefill" => Some(TraversalStrategy::Scanline),
            _ => None,
        }
    }

    /// True recursion needs a provisioned call stack
    pub fn needs_deep_stack(self) -> bool {
        self == TraversalStrategy::RecursiveDfs
    }
}

/// Neighbourhood used for expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    #[default]
    Four,
    Eight,
}

/// Right, left, down, up
const FOUR: [(i64, i64); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const EIGHT: [(i64, i64); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (-1, 1),
    (1, -1),
    (-1, -1),
];

impl Connectivity {
    #[inline]
    pub fn offsets(self) -> &'static [(i64, i64)] {
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// What a traversal does with the cells it reaches
pub trait FillVisitor {
    /// Whether an unvisited body cell belongs to this pass
    fn accepts(&self, x: usize, y: usize) -> bool;

    /// Called exactly once for each claimed cell
    fn visit(&mut self, x: usize, y: usize, idx: usize);
}

/// Frame-scoped working copy of body presence; claimed cells turn into
/// background and are never processed again in the same pass.
pub struct VisitMask<'a> {
    cells: &'a mut [u8],
    dims: Dimensions,
}

impl<'a> VisitMask<'a> {
    pub fn new(cells: &'a mut [u8], dims: Dimensions) -> Self {
        debug_assert_eq!(cells.len(), dims.len());
        Self { cells, dims }
    }

    #[inline]
    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    /// Still a body cell and not yet visited
    #[inline]
    pub fn is_open(&self, idx: usize) -> bool {
        is_body(self.cells[idx])
    }

    #[inline]
    fn mark(&mut self, idx: usize) {
        mark_visited(&mut self.cells[idx]);
    }
}

/// Worklists reused across frames so a pass never allocates
#[derive(Debug, Default)]
pub struct Worklists {
    stack: Vec<usize>,
    queue: VecDeque<usize>,
    ranges: FloodFillRangeQueue,
}

impl Worklists {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the list the strategy uses for a grid of `cells` cells
    pub fn prepare(&mut self, strategy: TraversalStrategy, cells: usize) {
        self.stack.clear();
        self.queue.clear();
        self.ranges.clear();
        match strategy {
            TraversalStrategy::IterativeDfs => self.stack.reserve(cells),
            TraversalStrategy::IterativeBfs => self.queue.reserve(cells),
            TraversalStrategy::Scanline => self.ranges.reserve(cells / 2 + 1),
            TraversalStrategy::Sequential | TraversalStrategy::RecursiveDfs => {},
        }
    }
}

/// Parameters of one traversal pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillRequest {
    pub strategy: TraversalStrategy,
    pub connectivity: Connectivity,
    /// Start cell; `None` falls back to a sequential scan
    pub seed: Option<(usize, usize)>,
    /// After the seeded fill, fill every body component the seed did not reach
    pub sweep_unreached: bool,
    /// Maximum recursion depth for `RecursiveDfs`
    pub recursion_budget: usize,
}

impl FillRequest {
    pub fn new(strategy: TraversalStrategy, connectivity: Connectivity) -> Self {
        Self {
            strategy,
            connectivity,
            seed: None,
            sweep_unreached: true,
            recursion_budget: usize::MAX,
        }
    }

    pub fn with_seed(mut self, seed: Option<(usize, usize)>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_sweep(mut self, sweep_unreached: bool) -> Self {
        self.sweep_unreached = sweep_unreached;
        self
    }

    pub fn with_recursion_budget(mut self, budget: usize) -> Self {
        self.recursion_budget = budget;
        self
    }

    /// Restrict the pass to the seed's own component. A sequential scan
    /// has no seed, so it becomes an explicit-stack fill.
    pub fn seed_component_only(mut self) -> Self {
        self.sweep_unreached = false;
        if self.strategy == TraversalStrategy::Sequential {
            self.strategy = TraversalStrategy::IterativeDfs;
        }
        self
    }
}

/// Counters from one traversal pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Cells claimed (marked visited and handed to the visitor)
    pub claimed: usize,
    /// Peak stack, queue, range-queue length or recursion depth
    pub max_pending: usize,
    /// Seeded fills started (seed plus swept components)
    pub components: usize,
    /// No usable seed; the pass ran as a sequential scan
    pub sequential_fallback: bool,
}

/// Shared claim logic for every strategy
pub(crate) struct Fill<'m, 'a, V> {
    pub mask: &'m mut VisitMask<'a>,
    pub visitor: &'m mut V,
    pub dims: Dimensions,
    pub offsets: &'static [(i64, i64)],
    pub stats: TraversalStats,
}

impl<'m, 'a, V: FillVisitor> Fill<'m, 'a, V> {
    #[inline]
    pub fn claimable(&self, x: usize, y: usize, idx: usize) -> bool {
        self.mask.is_open(idx) && self.visitor.accepts(x, y)
    }

    #[inline]
    pub fn claim(&mut self, x: usize, y: usize, idx: usize) {
        self.mask.mark(idx);
        self.visitor.visit(x, y, idx);
        self.stats.claimed += 1;
    }

    /// Neighbour at an offset, `None` outside the grid
    #[inline]
    pub fn neighbor(&self, x: usize, y: usize, (dx, dy): (i64, i64)) -> Option<(usize, usize, usize)> {
        let nx = x as i64 + dx;
        let ny = y as i64 + dy;
        self.dims
            .checked_index(nx, ny)
            .map(|i| (nx as usize, ny as usize, i))
    }

    #[inline]
    pub fn note_pending(&mut self, pending: usize) {
        if pending > self.stats.max_pending {
            self.stats.max_pending = pending;
        }
    }
}

/// Run one traversal pass over `mask`
pub fn flood<V: FillVisitor>(
    request: &FillRequest,
    mask: &mut VisitMask<'_>,
    lists: &mut Worklists,
    visitor: &mut V,
) -> Result<TraversalStats> {
    let dims = mask.dims();
    let mut fill = Fill {
        mask,
        visitor,
        dims,
        offsets: request.connectivity.offsets(),
        stats: TraversalStats::default(),
    };

    if request.strategy == TraversalStrategy::Sequential {
        sequential::scan(&mut fill);
        return Ok(fill.stats);
    }

    let Some(seed) = request.seed else {
        fill.stats.sequential_fallback = true;
        sequential::scan(&mut fill);
        return Ok(fill.stats);
    };

    let (sx, sy) = seed;
    if sx < dims.width && sy < dims.height {
        fill_component(request, &mut fill, lists, sx, sy)?;
    }

    if request.sweep_unreached {
        for idx in 0..dims.len() {
            let (x, y) = dims.coords(idx);
            if fill.claimable(x, y, idx) {
                fill_component(request, &mut fill, lists, x, y)?;
            }
        }
    }

    Ok(fill.stats)
}

fn fill_component<V: FillVisitor>(
    request: &FillRequest,
    fill: &mut Fill<'_, '_, V>,
    lists: &mut Worklists,
    x: usize,
    y: usize,
) -> Result<()> {
    let idx = fill.dims.index(x, y);
    if !fill.claimable(x, y, idx) {
        return Ok(());
    }
    fill.stats.components += 1;
    match request.strategy {
        TraversalStrategy::RecursiveDfs => {
            recursive::fill(fill, x, y, request.recursion_budget)?;
        },
        TraversalStrategy::IterativeDfs => worklist::fill(fill, &mut lists.stack, x, y),
        TraversalStrategy::IterativeBfs => worklist::fill(fill, &mut lists.queue, x, y),
        TraversalStrategy::Scanline => scanline::fill(fill, &mut lists.ranges, x, y),
        TraversalStrategy::Sequential => sequential::scan(fill),
    }
    Ok(())
}
