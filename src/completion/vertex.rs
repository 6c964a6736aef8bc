use std::fmt;

/// Position of a node in a completed tree
///
/// The same video can occupy several positions, so vertices are numbered
/// independently of node ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexId(u64);

impl VertexId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out increasing vertex ids; never reuses one
#[derive(Debug, Clone)]
pub struct VertexAllocator {
    next: u64,
}

impl VertexAllocator {
    /// Allocator whose first id is `first`
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    /// Allocator continuing after the largest id already in use
    pub fn after(largest: Option<VertexId>) -> Self {
        Self::starting_at(largest.map_or(0, |v| v.get() + 1))
    }

    pub fn allocate(&mut self) -> VertexId {
        let id = VertexId(self.next);
        self.next += 1;
        id
    }

    /// The id the next call to `allocate` returns
    pub fn peek(&self) -> VertexId {
        VertexId(self.next)
    }
}
