use proptest::prelude::*;
use serde_json::Value;
use tasker_config::Tree;

/// Strategy for scalar and sequence leaves
pub fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        "[a-z0-9_]{0,8}".prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
        prop::collection::vec(any::<i32>().prop_map(Value::from), 0..3).prop_map(Value::Array),
    ]
}

/// Strategy for a mapping holding only leaves under the keys `x`, `y`, `z`
pub fn leaf_map_strategy() -> impl Strategy<Value = Tree> {
    prop::collection::btree_map(prop::sample::select(vec!["x", "y", "z"]), leaf_strategy(), 0..4)
        .prop_map(|map| map.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

/// Strategy for trees with a fixed shape per key.
///
/// `x`/`y`/`z` are always leaves while `a`, `b` and `b.inner` are always
/// mappings, so any two generated trees agree on which paths are subtrees.
pub fn shaped_tree_strategy() -> impl Strategy<Value = Tree> {
    (
        leaf_map_strategy(),
        prop::option::of(leaf_map_strategy()),
        prop::option::of((leaf_map_strategy(), prop::option::of(leaf_map_strategy()))),
    )
        .prop_map(|(top, a, b)| {
            let mut tree = top;
            if let Some(a) = a {
                tree.insert("a".to_string(), Value::Object(a));
            }
            if let Some((mut b, inner)) = b {
                if let Some(inner) = inner {
                    b.insert("inner".to_string(), Value::Object(inner));
                }
                tree.insert("b".to_string(), Value::Object(b));
            }
            tree
        })
}

/// Every leaf of `tree` with its dotted path
pub fn leaf_paths(tree: &Tree) -> Vec<(String, Value)> {
    fn walk(prefix: &str, tree: &Tree, out: &mut Vec<(String, Value)>) {
        for (key, value) in tree {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match value {
                Value::Object(child) => walk(&path, child, out),
                leaf => out.push((path, leaf.clone())),
            }
        }
    }

    let mut out = Vec::new();
    walk("", tree, &mut out);
    out
}
