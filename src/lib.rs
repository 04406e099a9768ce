//! DFLOW: monotone dataflow analysis over control-flow graphs, with
//! analyses that may rewrite the IR while they run.

pub mod cfg;
pub mod entity;
mod errors;
pub mod ir;
pub mod oracle;
pub mod pass;
pub mod passes;

pub use errors::*;

#[cfg(feature = "fuzzing")]
pub mod fuzzing;
