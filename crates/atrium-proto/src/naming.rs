// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Field-name conversion between the wire convention (camelCase) and the
//! engine's internal convention (snake_case).
//!
//! This is the only place keys are rewritten. Envelope decoding and channel
//! frame decoding both route through [`to_internal`]; request bodies route
//! through [`to_wire`].

use serde_json::{Map, Value};

/// `workspaceId` → `workspace_id`, `dueAtUTC` → `due_at_utc`.
pub fn snake_case(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `workspace_id` → `workspaceId`. Leading underscores are kept.
pub fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        if c == '_' && !out.is_empty() {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn rewrite_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (rename(&k), rewrite_keys(v, rename)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| rewrite_keys(v, rename)).collect())
        }
        other => other,
    }
}

/// Recursively rename object keys from wire to internal convention.
pub fn to_internal(value: Value) -> Value {
    rewrite_keys(value, &snake_case)
}

/// Recursively rename object keys from internal to wire convention.
pub fn to_wire(value: Value) -> Value {
    rewrite_keys(value, &camel_case)
}
