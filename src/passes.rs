//! Analyses and rewrites built on the dataflow framework.

pub mod inline_var;
mod optimize;

pub use optimize::optimize;
