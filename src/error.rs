// src/error.rs

//! Error types for the query and goal engine

use thiserror::Error;

/// Errors surfaced by the public query/goal surface
#[derive(Error, Debug)]
pub enum Error {
    /// A filter was constructed with an incompatible keyname/comparison/match combination
    #[error("Invalid query filter: {0}")]
    BadQuery(String),

    /// A selector is ill-formed and cannot be lowered to a solver job
    #[error("Ill-formed selector: {0}")]
    BadSelector(String),

    /// The solver found no feasible transaction
    #[error("no solution possible")]
    NoSolution,

    /// The transaction would remove a protected package or the running kernel
    #[error("no solution, cannot remove protected package")]
    RemovalOfProtected,

    /// Internal state violation (e.g. reading results before run)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Debug data could not be written
    #[error("Invalid file: {0}")]
    FileInvalid(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
