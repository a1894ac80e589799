//! prefcnt-core: find debug-info types that no live function references.
//!
//! A debug-info graph is walked from every function that is not an inlined
//! definition. Each type reached through the function's return type,
//! parameters, locals or inline expansions has its reference counter bumped,
//! transitively through struct/union members. Afterwards every type that is
//! still at zero and has a declaration file is reported as *lost*: it survives
//! in the binary's metadata without any executable code using it.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use prefcnt_core::prelude::*;
//!
//! let analysis = Prefcnt::new("vmlinux.json").analyze()?;
//! prefcnt_core::print_plain(&analysis.debug_info, &analysis.report)?;
//! ```
//!
//! # Module Organization
//!
//! - [`model`]: Arena model of translation units, type nodes, members, variables
//! - [`provider`]: The `GraphProvider` seam
//! - [`dump`]: Provider reading JSON debug-info graph dumps
//! - [`refcnt`]: Reachability marker (reference counting walk)
//! - [`lost`]: Lost-type sweep
//! - [`layout`]: Struct hole/padding computation
//! - [`printer`]: Pahole-style node printer
//! - [`report`]: Plain and JSON report output
//! - [`builder`]: Fluent builder API
//! - [`error`]: Typed error handling
//!
//! # Cargo Features
//!
//! - `parallel` (default): walk translation units on the rayon thread pool

pub mod builder;
pub mod config;
pub mod dump;
pub mod error;
pub mod layout;
pub mod logging;
pub mod lost;
pub mod model;
pub mod prelude;
pub mod printer;
pub mod provider;
pub mod refcnt;
pub mod report;

// ============================================================================
// Explicit Re-exports
// ============================================================================

// Error types
pub use error::{IoResultExt, PrefcntError, PrefcntResult};

// Builder API
pub use builder::{Analysis, Prefcnt};

// Configuration
pub use config::{load_config, OutputConfig, PrefcntConfig, CONFIG_FILE};

// Graph model
pub use model::{
    DebugInfo, InlineExpansion, Member, NodeIndex, Tag, TranslationUnit, TypeId, TypeNode,
    Variable, VariableIndex,
};

// Providers
pub use dump::DumpFile;
pub use provider::GraphProvider;

// Passes
pub use layout::{find_holes, Layout};
pub use lost::{find_lost, is_ignored, is_lost, LostType, LostTypeReport, ReportStats};
pub use refcnt::{
    refcnt_all, refcnt_unit, RefCounter, RefcntOptions, UnitStats, DEFAULT_MAX_UNGUARDED_DEPTH,
};

// Logging
pub use logging::{init_structured_logging, log_error, log_info, log_warn, unit_span, DEFAULT_LOG_FILTER};

// Output
pub use printer::{print_node, type_name};
pub use report::{print_json, print_plain, write_plain};
