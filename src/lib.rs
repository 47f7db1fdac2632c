// src/lib.rs

//! quarry — package query and goal engine
//!
//! The query and transaction-planning core of an RPM-style package
//! manager. It answers two coupled questions: which packages match a
//! set of criteria (the query engine), and what concrete set of
//! install/remove/upgrade operations satisfies the user's requests
//! under all dependencies, conflicts, obsoletions and policy
//! constraints (the goal engine).
//!
//! # Architecture
//!
//! - Arena pool: one owner of all solvables, strings and reldeps;
//!   everything above it stores only integer ids
//! - Lazy queries: filters are queued as data and applied once per
//!   configuration, so queries are cheap to clone and snapshot
//! - Goals stage solver jobs, run the solver under policy (protected
//!   packages, running-kernel protection, install-only limits), and
//!   classify the resulting transaction into typed package sets
//! - Typed errors throughout; failures carry human-readable problem
//!   descriptions rendered from solver rule infos

pub mod advisory;
pub mod dep;
mod error;
pub mod goal;
pub mod history;
pub mod nevra;
pub mod pool;
pub mod query;
pub mod sack;
pub mod selector;
pub mod set;
pub mod solver;

pub use advisory::{Advisory, AdvisoryKind, AdvisoryPkg};
pub use dep::ReldepList;
pub use error::{Error, Result};
pub use goal::{actions, Goal, PkgState, Reason};
pub use history::{HistoryDb, MemoryHistory};
pub use nevra::{Form, Nevra, NevraId};
pub use pool::{DepKind, Id, Pool, Reldep};
pub use query::{cmp, Filter, Keyname, Query};
pub use sack::{ExcludeFlags, Sack};
pub use selector::Selector;
pub use set::{IdQueue, PackageSet};
