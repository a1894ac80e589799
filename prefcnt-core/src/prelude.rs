//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use prefcnt_core::prelude::*;
//! ```

// Errors
pub use crate::error::{PrefcntError, PrefcntResult};

// Graph model and providers
pub use crate::dump::DumpFile;
pub use crate::model::{DebugInfo, NodeIndex, Tag, TranslationUnit, TypeId, TypeNode};
pub use crate::provider::GraphProvider;

// Passes
pub use crate::lost::{find_lost, LostType, LostTypeReport};
pub use crate::refcnt::{refcnt_all, RefCounter, RefcntOptions};

// Configuration
pub use crate::config::{load_config, PrefcntConfig};

// Builder API
pub use crate::builder::{Analysis, Prefcnt};
