//! Tree Merge Utilities
//!
//! Combines the decoded trees of all sources into one unified tree.
//!
//! ## Deep Merge Semantics
//!
//! - **Mappings**: Recursively merge nested mappings, preserving keys from both sides
//! - **Scalars**: Incoming value replaces the accumulated value
//! - **Sequences**: Incoming value replaces the accumulated value (no element-wise merging)
//! - **New Keys**: Keys only in the incoming tree are inserted
//!
//! Collisions are never errors. The outcome depends only on application order,
//! which the loader fixes as source registration order followed by entry order
//! inside each source.
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use tasker_config::merge::merge_all;
//!
//! let base = json!({"database": {"url": "postgres://localhost", "pool": {"max": 10}}});
//! let overlay = json!({"database": {"pool": {"max": 50, "min": 5}}});
//!
//! let merged = merge_all([
//!     base.as_object().cloned().unwrap(),
//!     overlay.as_object().cloned().unwrap(),
//! ]);
//!
//! assert_eq!(merged["database"]["url"], "postgres://localhost");
//! assert_eq!(merged["database"]["pool"]["max"], 50);
//! assert_eq!(merged["database"]["pool"]["min"], 5);
//! ```

use crate::value::Tree;
use serde_json::Value;
use tracing::debug;

/// Deep merge `incoming` into `base`; incoming leaves win
pub fn merge_into(base: &mut Tree, incoming: Tree) {
    for (key, value) in incoming {
        match base.get_mut(&key) {
            Some(Value::Object(base_tree)) if value.is_object() => {
                if let Value::Object(incoming_tree) = value {
                    merge_into(base_tree, incoming_tree);
                }
            }
            Some(base_value) => {
                debug!(key = %key, "Overriding configuration leaf");
                *base_value = value;
            }
            None => {
                base.insert(key, value);
            }
        }
    }
}

/// Fold an ordered sequence of trees, later trees taking precedence
pub fn merge_all<I>(trees: I) -> Tree
where
    I: IntoIterator<Item = Tree>,
{
    trees.into_iter().fold(Tree::new(), |mut merged, tree| {
        merge_into(&mut merged, tree);
        merged
    })
}
