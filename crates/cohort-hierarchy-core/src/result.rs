//! Result type alias for hierarchy operations

use crate::error::HierarchyError;

/// Standard Result type for hierarchy operations
pub type Result<T> = std::result::Result<T, HierarchyError>;
