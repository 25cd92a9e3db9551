//! The Patch Engine — structurally-shared mutation of opaque workflow
//! state, producing a forward/inverse patch pair per update.
//!
//! State is represented as an opaque `serde_json::Value` (the runtime
//! never inspects its shape, per the data model). A reducer receives a
//! mutable draft and is free to mutate it arbitrarily; `update` diffs
//! the before/after draft into a minimal set of path-addressed patches
//! using a recursive, path-indexed comparison — the copy-on-write-tree
//! and in-place-mutation-with-recorded-undo strategies mentioned as
//! acceptable alternatives in the design notes both reduce to this same
//! forward/inverse pair at the boundary, so callers don't need to know
//! which one is behind `update`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single structural mutation at a JSON-Pointer-style path.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Patch {
    /// A key/index did not exist before and now holds `value`.
    Add {
        /// JSON-Pointer path to the new location.
        path: String,
        /// The value written there.
        value: Value,
    },
    /// A key/index changed from one value to another.
    Replace {
        /// JSON-Pointer path to the changed location.
        path: String,
        /// The new value at that location.
        value: Value,
    },
    /// A key/index that existed before is now gone.
    Remove {
        /// JSON-Pointer path to the removed location.
        path: String,
    },
}

impl Patch {
    /// The path this patch applies to.
    pub fn path(&self) -> &str {
        match self {
            Patch::Add { path, .. } | Patch::Replace { path, .. } | Patch::Remove { path } => {
                path
            }
        }
    }
}

/// The result of running a reducer through the Patch Engine.
pub struct UpdateResult {
    /// The state after the reducer ran.
    pub new_state: Value,
    /// Patches that replay `old_state -> new_state`.
    pub patches: Vec<Patch>,
    /// Patches that replay `new_state -> old_state`.
    pub inverse_patches: Vec<Patch>,
}

/// Apply a reducer to a draft of `state`, returning the new state plus
/// the forward and inverse patches describing the change.
///
/// The reducer sees an ephemeral, owned clone of `state` and may mutate
/// it freely (add/replace/remove keys, push to arrays, anything a
/// `serde_json::Value` supports) — it is never the engine's job to
/// understand what the mutation *means*, only to describe it.
pub fn update<F>(state: &Value, reducer: F) -> UpdateResult
where
    F: FnOnce(&mut Value),
{
    let mut draft = state.clone();
    reducer(&mut draft);

    let mut patches = Vec::new();
    let mut inverse_patches = Vec::new();
    diff("", state, &draft, &mut patches, &mut inverse_patches);

    UpdateResult {
        new_state: draft,
        patches,
        inverse_patches,
    }
}

/// Re-apply a previously recorded sequence of patches to `state`,
/// producing the state they were derived against reaching forward. Used
/// by the Replay Engine's "apply patches" fast path (as opposed to
/// re-running reducers).
pub fn apply_patches(state: &Value, patches: &[Patch]) -> Value {
    let mut result = state.clone();
    for patch in patches {
        apply_one(&mut result, patch);
    }
    result
}

fn apply_one(root: &mut Value, patch: &Patch) {
    match patch {
        Patch::Add { path, value } | Patch::Replace { path, value } => {
            set_at_pointer(root, path, value.clone());
        }
        Patch::Remove { path } => {
            remove_at_pointer(root, path);
        }
    }
}

fn diff(
    path: &str,
    old: &Value,
    new: &Value,
    patches: &mut Vec<Patch>,
    inverse: &mut Vec<Patch>,
) {
    if old == new {
        return;
    }

    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            diff_object(path, old_map, new_map, patches, inverse);
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            diff_array(path, old_items, new_items, patches, inverse);
        }
        _ => {
            patches.push(Patch::Replace {
                path: path.to_string(),
                value: new.clone(),
            });
            inverse.push(Patch::Replace {
                path: path.to_string(),
                value: old.clone(),
            });
        }
    }
}

fn diff_object(
    path: &str,
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    patches: &mut Vec<Patch>,
    inverse: &mut Vec<Patch>,
) {
    for (key, new_value) in new {
        let child_path = format!("{path}/{}", escape_pointer_segment(key));
        match old.get(key) {
            None => {
                patches.push(Patch::Add {
                    path: child_path.clone(),
                    value: new_value.clone(),
                });
                inverse.push(Patch::Remove { path: child_path });
            }
            Some(old_value) => diff(&child_path, old_value, new_value, patches, inverse),
        }
    }
    for (key, old_value) in old {
        if !new.contains_key(key) {
            let child_path = format!("{path}/{}", escape_pointer_segment(key));
            patches.push(Patch::Remove {
                path: child_path.clone(),
            });
            inverse.push(Patch::Add {
                path: child_path,
                value: old_value.clone(),
            });
        }
    }
}

fn diff_array(
    path: &str,
    old: &[Value],
    new: &[Value],
    patches: &mut Vec<Patch>,
    inverse: &mut Vec<Patch>,
) {
    // Index-wise comparison. Good enough for the common case of a
    // workflow appending to or replacing an array wholesale; it is not
    // an LCS-minimal diff, which is an acceptable trade per the design
    // notes (the engine only promises *a* valid forward/inverse pair,
    // not the shortest one).
    let max_len = old.len().max(new.len());
    for i in 0..max_len {
        let child_path = format!("{path}/{i}");
        match (old.get(i), new.get(i)) {
            (Some(o), Some(n)) => diff(&child_path, o, n, patches, inverse),
            (None, Some(n)) => {
                patches.push(Patch::Add {
                    path: child_path.clone(),
                    value: n.clone(),
                });
                inverse.push(Patch::Remove { path: child_path });
            }
            (Some(o), None) => {
                patches.push(Patch::Remove {
                    path: child_path.clone(),
                });
                inverse.push(Patch::Add {
                    path: child_path,
                    value: o.clone(),
                });
            }
            (None, None) => unreachable!(),
        }
    }
}

fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape_pointer_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

fn pointer_segments(path: &str) -> Vec<String> {
    path.trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(unescape_pointer_segment)
        .collect()
}

fn set_at_pointer(root: &mut Value, path: &str, value: Value) {
    let segments = pointer_segments(path);
    if segments.is_empty() {
        *root = value;
        return;
    }
    if let Some(target) = navigate_mut(root, &segments[..segments.len() - 1]) {
        let last = &segments[segments.len() - 1];
        match target {
            Value::Object(map) => {
                map.insert(last.clone(), value);
            }
            Value::Array(items) => {
                if let Ok(idx) = last.parse::<usize>() {
                    if idx < items.len() {
                        items[idx] = value;
                    } else {
                        items.push(value);
                    }
                }
            }
            _ => {}
        }
    }
}

fn remove_at_pointer(root: &mut Value, path: &str) {
    let segments = pointer_segments(path);
    if segments.is_empty() {
        return;
    }
    if let Some(target) = navigate_mut(root, &segments[..segments.len() - 1]) {
        let last = &segments[segments.len() - 1];
        match target {
            Value::Object(map) => {
                map.remove(last);
            }
            Value::Array(items) => {
                if let Ok(idx) = last.parse::<usize>()
                    && idx < items.len()
                {
                    items.remove(idx);
                }
            }
            _ => {}
        }
    }
}

fn navigate_mut<'a>(root: &'a mut Value, segments: &[String]) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
