//! Change detection fingerprints (v0.1)
//!
//! A fingerprint is a comparable summary of a store value, computed per
//! binding role. Reconciliation re-applies a node only when its fingerprint
//! differs between the previous and current snapshot:
//!
//! | role                | fingerprint                          |
//! |---------------------|--------------------------------------|
//! | scalar input        | the value itself                     |
//! | collection          | sorted, comma-joined key set         |
//! | asset display       | the `lastModified` stamp, or absent  |
//! | conditional         | truthiness of the value              |
//!
//! Action triggers carry no fingerprint; they are never reconciled.

use serde_json::Value;

/// Role tag carried by a bound node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    ScalarInput,
    Collection,
    AssetDisplay,
    Conditional,
}

/// Comparable summary of a value under a given role
#[derive(Debug, Clone, PartialEq)]
pub enum Fingerprint {
    /// Structural identity of the raw value (`None` when absent)
    Scalar(Option<Value>),
    /// Sorted, comma-joined key set; empty string when absent
    Keys(String),
    /// The asset's declared modification stamp, or absent
    Stamp(Option<Value>),
    /// Truthiness of the value
    Truthy(bool),
}

/// Compute the fingerprint of `value` under `role`
pub fn fingerprint(role: Role, value: Option<&Value>) -> Fingerprint {
    match role {
        Role::ScalarInput => Fingerprint::Scalar(value.cloned()),
        Role::Collection => {
            let mut keys: Vec<&str> = match value {
                Some(Value::Object(map)) => map.keys().map(|k| k.as_str()).collect(),
                _ => Vec::new(),
            };
            keys.sort_unstable();
            Fingerprint::Keys(keys.join(","))
        }
        Role::AssetDisplay => {
            Fingerprint::Stamp(value.and_then(|v| v.get("lastModified")).cloned())
        }
        Role::Conditional => Fingerprint::Truthy(truthy(value)),
    }
}

/// Decide whether a node must be re-applied
///
/// Callers handle the first-pass case (`previous == None` at the snapshot
/// level) before consulting this; here both sides are plain value lookups.
pub fn changed(role: Role, old: Option<&Value>, new: Option<&Value>) -> bool {
    fingerprint(role, old) != fingerprint(role, new)
}

/// Truthiness of a store value
///
/// Mirrors the store's display semantics: absent, null, `false`, zero and
/// the empty string are falsy; any mapping is truthy, even an empty one.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Object(_)) | Some(Value::Array(_)) => true,
    }
}

/// Render a scalar value the way the surface displays it
///
/// Absent values display as the empty string; integral numbers drop the
/// fractional suffix.
pub fn display_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else {
                n.to_string()
            }
        }
        Some(other) => other.to_string(),
    }
}
