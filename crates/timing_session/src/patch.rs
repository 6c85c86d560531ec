//! Structural diff application for recorded intra-frames.
//!
//! An intra-frame stores `cars` and `session` as a list of operations
//! against the previous frame:
//!
//! ```text
//! ["change", path, [old, new]]
//! ["add",    path, [[key, value], ...]]
//! ["remove", path, [[key, value], ...]]
//! ```
//!
//! `path` is either a dotted string (`"a.b"`, `""` for the root) or a list
//! of keys and indices (`[3, 2]`). `add`/`remove` address the container at
//! `path`; `change` addresses the element itself.

use serde_json::Value;

use crate::error::{Result, SessionError};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Segment::Key(s.clone())),
            Value::Number(n) => n
                .as_u64()
                .map(|i| Segment::Index(i as usize))
                .ok_or_else(|| SessionError::patch(format!("bad index {n}"))),
            other => Err(SessionError::patch(format!("bad path segment {other}"))),
        }
    }

    fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(i) => Some(*i),
            Segment::Key(k) => k.parse().ok(),
        }
    }

    fn as_key(&self) -> String {
        match self {
            Segment::Key(k) => k.clone(),
            Segment::Index(i) => i.to_string(),
        }
    }
}

fn parse_path(path: &Value) -> Result<Vec<Segment>> {
    match path {
        Value::String(s) if s.is_empty() => Ok(Vec::new()),
        Value::String(s) => Ok(s.split('.').map(|k| Segment::Key(k.to_string())).collect()),
        Value::Array(items) => items.iter().map(Segment::from_value).collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(SessionError::patch(format!("bad path {other}"))),
    }
}

fn lookup<'a>(root: &'a mut Value, path: &[Segment]) -> Result<&'a mut Value> {
    let mut node = root;
    for segment in path {
        let next = match node {
            Value::Array(items) => segment.as_index().and_then(|i| items.get_mut(i)),
            Value::Object(map) => map.get_mut(&segment.as_key()),
            _ => None,
        };
        node = next.ok_or_else(|| SessionError::patch(format!("no node at {segment:?}")))?;
    }
    Ok(node)
}

/// Apply diff operations to `target` in order
pub fn apply_diff(target: &mut Value, diff: &[Value]) -> Result<()> {
    for op in diff {
        let (kind, path, changes) = match op.as_array().map(Vec::as_slice) {
            Some([Value::String(kind), path, changes]) => (kind.as_str(), path, changes),
            _ => return Err(SessionError::patch(format!("malformed operation {op}"))),
        };
        let path = parse_path(path)?;

        match kind {
            "change" => change(target, &path, changes)?,
            "add" => add(lookup(target, &path)?, changes)?,
            "remove" => remove(lookup(target, &path)?, changes)?,
            other => return Err(SessionError::patch(format!("unknown operation '{other}'"))),
        }
    }
    Ok(())
}

fn change(target: &mut Value, path: &[Segment], changes: &Value) -> Result<()> {
    let new = match changes.as_array().map(Vec::as_slice) {
        Some([_old, new]) => new.clone(),
        _ => return Err(SessionError::patch("change needs [old, new]")),
    };
    let Some((last, parent_path)) = path.split_last() else {
        *target = new;
        return Ok(());
    };

    match lookup(target, parent_path)? {
        Value::Array(items) => {
            let slot = last
                .as_index()
                .and_then(|i| items.get_mut(i))
                .ok_or_else(|| SessionError::patch(format!("index {last:?} out of range")))?;
            *slot = new;
        }
        Value::Object(map) => {
            map.insert(last.as_key(), new);
        }
        _ => return Err(SessionError::patch("change target is not a container")),
    }
    Ok(())
}

fn pairs(changes: &Value) -> Result<Vec<(Segment, Value)>> {
    let items = changes
        .as_array()
        .ok_or_else(|| SessionError::patch("expected a list of [key, value] pairs"))?;
    items
        .iter()
        .map(|pair| match pair.as_array().map(Vec::as_slice) {
            Some([key, value]) => Ok((Segment::from_value(key)?, value.clone())),
            _ => Err(SessionError::patch(format!("bad pair {pair}"))),
        })
        .collect()
}

fn add(dest: &mut Value, changes: &Value) -> Result<()> {
    for (key, value) in pairs(changes)? {
        match dest {
            Value::Array(items) => {
                let index = key
                    .as_index()
                    .ok_or_else(|| SessionError::patch(format!("bad list index {key:?}")))?;
                items.insert(index.min(items.len()), value);
            }
            Value::Object(map) => {
                map.insert(key.as_key(), value);
            }
            _ => return Err(SessionError::patch("add target is not a container")),
        }
    }
    Ok(())
}

fn remove(dest: &mut Value, changes: &Value) -> Result<()> {
    for (key, _) in pairs(changes)? {
        match dest {
            Value::Array(items) => match key.as_index() {
                Some(index) if index < items.len() => {
                    items.remove(index);
                }
                _ => return Err(SessionError::patch(format!("index {key:?} out of range"))),
            },
            Value::Object(map) => {
                map.remove(&key.as_key());
            }
            _ => return Err(SessionError::patch("remove target is not a container")),
        }
    }
    Ok(())
}
