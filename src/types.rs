/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Kind of write a single database operation performs.
/// Batch results are counted per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}
