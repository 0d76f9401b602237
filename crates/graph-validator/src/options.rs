//! Build and traversal options.
//!
//! Both structs deserialize from the embedding service's own configuration:
//!
//! ```json
//! { "build": { "mode": { "strategy": "parallel", "workers": 4 } },
//!   "traversal": { "max_concurrency": 8 } }
//! ```

use std::fmt;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// How the type graph is discovered and compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BuildMode {
    /// Single thread, no locking.
    #[default]
    Sequential,
    /// Single thread, output table guarded by a mutex.
    Locked,
    /// Fixed pool of worker threads sharing one frontier.
    Parallel {
        /// Number of workers.
        workers: NonZeroUsize,
    },
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::Locked => f.write_str("locked"),
            Self::Parallel { workers } => write!(f, "parallel({workers})"),
        }
    }
}

/// Options applied to [`ValidatorBuilder::build_with`](crate::ValidatorBuilder::build_with).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Discovery strategy.
    #[serde(default)]
    pub mode: BuildMode,
}

impl BuildOptions {
    /// Options for a parallel build with `workers` threads.
    #[must_use]
    pub fn parallel(workers: NonZeroUsize) -> Self {
        Self {
            mode: BuildMode::Parallel { workers },
        }
    }
}

/// Options applied to a [`ValidationContext`](crate::ValidationContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalOptions {
    /// Worker count for parallel traversal. Zero is rejected on load.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: NonZeroUsize,
}

fn default_max_concurrency() -> NonZeroUsize {
    NonZeroUsize::MIN
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}
