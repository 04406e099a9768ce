//! Error types.

/// An internal-compiler-error raised while analyzing or rewriting a
/// method body. None of these are caused by user input: each one
/// means an analysis instance or the engine broke a contract, and the
/// current method must not be analyzed any further.
#[derive(Clone, Debug)]
pub enum AnalysisError {
    /// A fragment presented for splicing still has graph-level
    /// in-edges or out-edges.
    DanglingPorts(String),
    /// A transformation's mutator did not make exactly one
    /// substitution in the IR.
    UnchangedTarget(String),
    /// No statement node encloses the node being rewritten.
    MissingStatement(String),
    /// The node to be replaced is not live in the graph.
    StaleNode(String),
    /// The CFG builder met an IR construct it cannot lower.
    Unsupported(String),
    /// A structural graph invariant does not hold.
    Internal(String),
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for AnalysisError {}
