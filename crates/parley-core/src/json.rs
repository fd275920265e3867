// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Partial-document merge used by the write-behind queue and the backing
//! store's upsert path.

use serde_json::Value;

/// Merges `patch` into `base`.
///
/// Objects merge recursively; every other value (scalars, arrays, nulls)
/// replaces the base wholesale — last write wins per field. A whole-array
/// field like a conversation history is therefore replaced, never unioned
/// element-wise.
pub fn merge_patch(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_patch(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base_slot, patch) => *base_slot = patch,
    }
}

/// Returns `base` with `patch` merged in, consuming both.
pub fn merged(mut base: Value, patch: Value) -> Value {
    merge_patch(&mut base, patch);
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn disjoint_fields_union() {
        let out = merged(json!({"a": 1}), json!({"b": 2}));
        assert_eq!(out, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn same_field_last_write_wins() {
        let out = merged(json!({"a": 1}), json!({"a": 9}));
        assert_eq!(out, json!({"a": 9}));
    }

    #[test]
    fn nested_objects_merge_recursively() {
        let out = merged(
            json!({"meta": {"tone": "aria", "active": true}}),
            json!({"meta": {"tone": "sage"}}),
        );
        assert_eq!(out, json!({"meta": {"tone": "sage", "active": true}}));
    }

    #[test]
    fn arrays_replace_wholesale() {
        let out = merged(json!({"history": [1, 2]}), json!({"history": [3]}));
        assert_eq!(out, json!({"history": [3]}));
    }

    #[test]
    fn non_object_patch_replaces_base() {
        let out = merged(json!({"a": 1}), json!(null));
        assert_eq!(out, json!(null));
    }
}
