//! Dataflow framework: assumptions, transfer functions and the
//! fixpoint solver.
//!
//! An analysis attaches an `Assumption` to every CFG edge. In pure
//! mode the solver only computes those facts. In integrated mode the
//! flow function may instead ask for a node to be rewritten; the
//! solver then edits the IR and splices a new fragment into the graph
//! in place of the node. Facts flow forward or backward, and
//! `Combined` solves several analyses in one pass.

pub mod combined;
pub use combined::*;
pub mod dataflow;
pub use dataflow::*;
pub mod lattice;
pub use lattice::*;

/// A budget of rewrites, for bisecting a misbehaving transformation.
#[derive(Clone, Debug)]
pub struct Fuel {
    pub remaining: u64,
    pub consumed: u64,
}

impl Fuel {
    pub fn consume(&mut self) -> bool {
        self.consumed += 1;
        if self.remaining == u64::MAX {
            return true;
        }
        if self.remaining == 0 {
            false
        } else {
            self.remaining -= 1;
            true
        }
    }

    pub fn infinite() -> Fuel {
        Fuel {
            consumed: 0,
            remaining: u64::MAX,
        }
    }

    pub fn limited(remaining: u64) -> Fuel {
        Fuel {
            consumed: 0,
            remaining,
        }
    }
}

impl std::default::Default for Fuel {
    fn default() -> Self {
        Fuel::infinite()
    }
}

#[derive(Clone, Debug, Default)]
pub struct SolverOptions {
    /// Rewrites allowed in integrated mode.
    pub fuel: Fuel,
    /// Verify the graph after every splice.
    pub verify: bool,
}
