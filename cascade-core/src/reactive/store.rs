//! Reactive Stores
//!
//! A Store holds a JSON document as a tree of signals, so that readers only
//! re-run when the part of the document they read changes.
//!
//! # Layout
//!
//! - Scalars (null, bools, numbers, strings) are leaf signals.
//! - Objects and arrays own their children plus a *shape* signal, bumped when
//!   a key is added or removed, the length changes, the key order changes, or
//!   a child changes kind (e.g. a string becomes an object).
//! - A version signal on the store is bumped when the root changes kind.
//!
//! Reading a path tracks the shape of every container walked through and
//! every signal of the returned subtree. Writing reconciles the new value
//! against the tree: leaves are written in place (equal values are no-ops),
//! containers are compared key by key or index by index, and only changed
//! kinds rebuild a subtree.
//!
//! All signals live in a scope owned by the store, so they outlive the
//! computation that happened to create them and go away with the store.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{ReactiveError, Result};

use super::path::{parse_index, Path, APPEND};
use super::runtime::{Runtime, WeakRuntime};
use super::scope::Scope;
use super::signal::Signal;

#[derive(Clone)]
enum StoreNode {
    Leaf(Signal<Value>),
    Object {
        shape: Signal<u64>,
        fields: Rc<RefCell<IndexMap<String, StoreNode>>>,
    },
    Array {
        shape: Signal<u64>,
        items: Rc<RefCell<Vec<StoreNode>>>,
    },
}

impl StoreNode {
    /// Build a subtree. Call with the store's scope as owner.
    fn build(rt: &Runtime, value: Value) -> Self {
        match value {
            Value::Object(map) => {
                let fields = map
                    .into_iter()
                    .map(|(key, value)| (key, StoreNode::build(rt, value)))
                    .collect();
                StoreNode::Object {
                    shape: Signal::new(rt, 0),
                    fields: Rc::new(RefCell::new(fields)),
                }
            }
            Value::Array(values) => {
                let items = values
                    .into_iter()
                    .map(|value| StoreNode::build(rt, value))
                    .collect();
                StoreNode::Array {
                    shape: Signal::new(rt, 0),
                    items: Rc::new(RefCell::new(items)),
                }
            }
            scalar => StoreNode::Leaf(Signal::new(rt, scalar)),
        }
    }

    /// Tracked read of the whole subtree.
    fn read(&self) -> Value {
        match self {
            StoreNode::Leaf(signal) => signal.get(),
            StoreNode::Object { shape, fields } => {
                let _ = shape.get();
                let fields = fields.borrow();
                let mut map = Map::with_capacity(fields.len());
                for (key, child) in fields.iter() {
                    map.insert(key.clone(), child.read());
                }
                Value::Object(map)
            }
            StoreNode::Array { shape, items } => {
                let _ = shape.get();
                Value::Array(items.borrow().iter().map(StoreNode::read).collect())
            }
        }
    }

    /// Tracked step into a child.
    fn child(&self, segment: &str, walked: &Path, full: &Path) -> Result<StoreNode> {
        match self {
            StoreNode::Leaf(_) => Err(ReactiveError::NotAContainer {
                path: walked.to_string(),
            }),
            StoreNode::Object { shape, fields } => {
                let _ = shape.get();
                fields
                    .borrow()
                    .get(segment)
                    .cloned()
                    .ok_or_else(|| not_found(full))
            }
            StoreNode::Array { shape, items } => {
                let _ = shape.get();
                let index = parse_index(segment).ok_or_else(|| bad_index(full, segment))?;
                items
                    .borrow()
                    .get(index)
                    .cloned()
                    .ok_or_else(|| not_found(full))
            }
        }
    }

    fn dispose(&self) {
        match self {
            StoreNode::Leaf(signal) => signal.dispose(),
            StoreNode::Object { shape, fields } => {
                shape.dispose();
                for child in fields.borrow().values() {
                    child.dispose();
                }
            }
            StoreNode::Array { shape, items } => {
                shape.dispose();
                for child in items.borrow().iter() {
                    child.dispose();
                }
            }
        }
    }
}

/// A container replacement staged by planning.
enum Swap {
    Fields(Rc<RefCell<IndexMap<String, StoreNode>>>, IndexMap<String, StoreNode>),
    Items(Rc<RefCell<Vec<StoreNode>>>, Vec<StoreNode>),
    Root(StoreNode),
}

/// Everything a write will do, planned without touching the tree.
///
/// Nothing is installed until every signal in `writes` and `bumps` has been
/// cleared for writing, so a rejected write leaves the document as it was.
#[derive(Default)]
struct Changes {
    writes: Vec<(Signal<Value>, Value)>,
    bumps: Vec<Signal<u64>>,
    swaps: Vec<Swap>,
    /// Subtrees dropped from the document.
    removed: Vec<StoreNode>,
    /// Subtrees created for the new value; disposed if the write is rejected.
    built: Vec<StoreNode>,
}

struct StoreInner {
    runtime: WeakRuntime,
    scope: Scope,
    version: Signal<u64>,
    root: RefCell<StoreNode>,
}

/// A JSON document stored as fine-grained reactive state.
///
/// # Example
///
/// ```rust
/// use cascade_core::reactive::{Path, Runtime, Store};
/// use serde_json::json;
///
/// let rt = Runtime::new();
/// let store = Store::new(&rt, json!({ "todos": [{ "title": "write docs", "done": false }] }));
///
/// let done = Path::root().key("todos").index(0).key("done");
/// store.set(&done, json!(true)).unwrap();
/// assert_eq!(store.get(&done).unwrap(), json!(true));
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Store {
    pub fn new(rt: &Runtime, value: Value) -> Self {
        let scope = Scope::new(rt);
        let (version, root) = {
            let _owner = rt.enter_owner(Some(scope.id()));
            (Signal::new(rt, 0), StoreNode::build(rt, value))
        };

        Self {
            inner: Rc::new(StoreInner {
                runtime: rt.downgrade(),
                scope,
                version,
                root: RefCell::new(root),
            }),
        }
    }

    /// Build a store from any serializable value.
    pub fn from_serialize<T: serde::Serialize>(
        rt: &Runtime,
        value: &T,
    ) -> std::result::Result<Self, serde_json::Error> {
        Ok(Self::new(rt, serde_json::to_value(value)?))
    }

    /// Read the value at `path`, subscribing the running computation to it.
    pub fn get(&self, path: &Path) -> Result<Value> {
        Ok(self.node_at(path, path.len())?.read())
    }

    pub fn get_untracked(&self, path: &Path) -> Result<Value> {
        match self.inner.runtime.upgrade() {
            Some(rt) => rt.untrack(|| self.get(path)),
            None => self.get(path),
        }
    }

    /// True if a value lives at `path`. Tracked like [`get`](Self::get).
    pub fn contains(&self, path: &Path) -> bool {
        self.node_at(path, path.len()).is_ok()
    }

    /// The whole document, untracked.
    pub fn snapshot(&self) -> Value {
        self.get_untracked(&Path::root()).unwrap_or(Value::Null)
    }

    /// Write `value` at `path`, creating the last segment if it is missing.
    ///
    /// Intermediate containers must exist. On arrays the last segment may be
    /// an index up to the current length, or `-` to append. The write is all
    /// or nothing: if any affected signal rejects it, the document is left
    /// unchanged.
    pub fn set(&self, path: &Path, value: Value) -> Result<()> {
        let rt = self.inner.runtime.runtime()?;
        rt.ensure_live(self.inner.scope.id())?;

        let changes = rt.untrack(|| self.plan_set(&rt, path, value))?;
        self.commit(&rt, changes)
    }

    /// Set the value at `path` computed from the current one.
    pub fn update(&self, path: &Path, f: impl FnOnce(&Value) -> Value) -> Result<()> {
        let current = self.get_untracked(path)?;
        self.set(path, f(&current))
    }

    /// Remove the value at `path` and return it. Array elements after it
    /// shift down.
    pub fn remove(&self, path: &Path) -> Result<Value> {
        let rt = self.inner.runtime.runtime()?;
        rt.ensure_live(self.inner.scope.id())?;
        let Some((parent_path, last)) = path.split_last() else {
            return Err(ReactiveError::InvalidPath {
                path: path.to_string(),
                reason: "the root cannot be removed".into(),
            });
        };

        let (removed, shape, swap) = rt.untrack(|| -> Result<_> {
            let parent = self.node_at(path, parent_path.len())?;
            match &parent {
                StoreNode::Leaf(_) => Err(ReactiveError::NotAContainer {
                    path: parent_path.to_string(),
                }),
                StoreNode::Object { shape, fields } => {
                    let mut next = fields.borrow().clone();
                    let removed = next.shift_remove(last).ok_or_else(|| not_found(path))?;
                    Ok((removed, shape.clone(), Swap::Fields(Rc::clone(fields), next)))
                }
                StoreNode::Array { shape, items } => {
                    let index = parse_index(last).ok_or_else(|| bad_index(path, last))?;
                    let mut next = items.borrow().clone();
                    if index >= next.len() {
                        return Err(not_found(path));
                    }
                    let removed = next.remove(index);
                    Ok((removed, shape.clone(), Swap::Items(Rc::clone(items), next)))
                }
            }
        })?;

        let value = rt.untrack(|| removed.read());
        let changes = Changes {
            bumps: vec![shape],
            swaps: vec![swap],
            removed: vec![removed],
            ..Changes::default()
        };
        self.commit(&rt, changes)?;
        Ok(value)
    }

    /// Dispose every signal of the store.
    pub fn dispose(&self) {
        self.inner.scope.dispose();
    }

    /// Walk the first `depth` segments of `path`.
    fn node_at(&self, path: &Path, depth: usize) -> Result<StoreNode> {
        let _ = self.inner.version.get();
        let mut node = self.inner.root.borrow().clone();

        for (walked, segment) in path.segments().take(depth).enumerate() {
            node = node.child(segment, &path.prefix(walked), path)?;
        }
        Ok(node)
    }

    fn build(&self, rt: &Runtime, value: Value, changes: &mut Changes) -> StoreNode {
        let node = {
            let _owner = rt.enter_owner(Some(self.inner.scope.id()));
            StoreNode::build(rt, value)
        };
        changes.built.push(node.clone());
        node
    }

    fn plan_set(&self, rt: &Runtime, path: &Path, value: Value) -> Result<Changes> {
        let mut changes = Changes::default();

        let Some((parent_path, last)) = path.split_last() else {
            let root = self.inner.root.borrow().clone();
            if let Some(replacement) = self.reconcile(rt, &root, value, &mut changes) {
                changes.swaps.push(Swap::Root(replacement));
                changes.removed.push(root);
                changes.bumps.push(self.inner.version.clone());
            }
            return Ok(changes);
        };

        let parent = self.node_at(path, parent_path.len())?;
        match &parent {
            StoreNode::Leaf(_) => {
                return Err(ReactiveError::NotAContainer {
                    path: parent_path.to_string(),
                })
            }
            StoreNode::Object { shape, fields } => {
                let existing = fields.borrow().get(last).cloned();
                let replacement = match existing {
                    Some(child) => {
                        let replacement = self.reconcile(rt, &child, value, &mut changes);
                        if replacement.is_some() {
                            changes.removed.push(child);
                        }
                        replacement
                    }
                    None => Some(self.build(rt, value, &mut changes)),
                };
                if let Some(node) = replacement {
                    let mut next = fields.borrow().clone();
                    next.insert(last.to_string(), node);
                    changes.swaps.push(Swap::Fields(Rc::clone(fields), next));
                    changes.bumps.push(shape.clone());
                }
            }
            StoreNode::Array { shape, items } => {
                let len = items.borrow().len();
                let index = if last == APPEND {
                    len
                } else {
                    parse_index(last).ok_or_else(|| bad_index(path, last))?
                };

                if index > len {
                    return Err(not_found(path));
                }
                let replacement = if index == len {
                    Some(self.build(rt, value, &mut changes))
                } else {
                    let child = items.borrow()[index].clone();
                    let replacement = self.reconcile(rt, &child, value, &mut changes);
                    if replacement.is_some() {
                        changes.removed.push(child);
                    }
                    replacement
                };
                if let Some(node) = replacement {
                    let mut next = items.borrow().clone();
                    if index == len {
                        next.push(node);
                    } else {
                        next[index] = node;
                    }
                    changes.swaps.push(Swap::Items(Rc::clone(items), next));
                    changes.bumps.push(shape.clone());
                }
            }
        }

        Ok(changes)
    }

    /// Fold `value` into `node`. Returns a replacement node when the kind
    /// changed; the caller swaps it in and bumps the parent's shape.
    fn reconcile(
        &self,
        rt: &Runtime,
        node: &StoreNode,
        value: Value,
        changes: &mut Changes,
    ) -> Option<StoreNode> {
        match (node, value) {
            (StoreNode::Leaf(signal), value) if !is_container(&value) => {
                if signal.with_untracked(|current| current != &value) {
                    changes.writes.push((signal.clone(), value));
                }
                None
            }
            (StoreNode::Object { shape, fields }, Value::Object(map)) => {
                let mut previous = fields.borrow().clone();
                let old_keys: Vec<String> = previous.keys().cloned().collect();
                let mut structural = false;

                let mut next = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    let child = match previous.shift_remove(&key) {
                        Some(child) => match self.reconcile(rt, &child, value, changes) {
                            Some(replacement) => {
                                changes.removed.push(child);
                                structural = true;
                                replacement
                            }
                            None => child,
                        },
                        None => self.build(rt, value, changes),
                    };
                    next.insert(key, child);
                }

                changes.removed.extend(previous.into_values());
                if structural || !next.keys().eq(old_keys.iter()) {
                    changes.bumps.push(shape.clone());
                    changes.swaps.push(Swap::Fields(Rc::clone(fields), next));
                }
                None
            }
            (StoreNode::Array { shape, items }, Value::Array(values)) => {
                let old_len = items.borrow().len();
                let mut previous = items.borrow().clone().into_iter();
                let mut structural = false;

                let mut next = Vec::with_capacity(values.len());
                for value in values {
                    let child = match previous.next() {
                        Some(child) => match self.reconcile(rt, &child, value, changes) {
                            Some(replacement) => {
                                changes.removed.push(child);
                                structural = true;
                                replacement
                            }
                            None => child,
                        },
                        None => self.build(rt, value, changes),
                    };
                    next.push(child);
                }

                changes.removed.extend(previous);
                if structural || next.len() != old_len {
                    changes.bumps.push(shape.clone());
                    changes.swaps.push(Swap::Items(Rc::clone(items), next));
                }
                None
            }
            (_, value) => Some(self.build(rt, value, changes)),
        }
    }

    /// Check every planned write, then install the new containers and notify.
    fn commit(&self, rt: &Runtime, changes: Changes) -> Result<()> {
        let cells = changes
            .writes
            .iter()
            .map(|(signal, _)| signal.id())
            .chain(changes.bumps.iter().map(Signal::id));
        for cell in cells {
            if let Err(err) = rt.prepare_write(cell) {
                for node in &changes.built {
                    node.dispose();
                }
                return Err(err);
            }
        }

        for swap in changes.swaps {
            match swap {
                Swap::Fields(fields, next) => *fields.borrow_mut() = next,
                Swap::Items(items, next) => *items.borrow_mut() = next,
                Swap::Root(node) => *self.inner.root.borrow_mut() = node,
            }
        }

        let (writes, bumps, removed) = (changes.writes, changes.bumps, changes.removed);
        rt.batch(|| Self::apply(writes, bumps, removed))?
    }

    fn apply(
        writes: Vec<(Signal<Value>, Value)>,
        bumps: Vec<Signal<u64>>,
        removed: Vec<StoreNode>,
    ) -> Result<()> {
        if !removed.is_empty() {
            tracing::debug!(subtrees = removed.len(), "disposing replaced store nodes");
        }
        for node in removed {
            node.dispose();
        }

        // Keep going after a failure so the notifications match the tree.
        let mut first_error = None;
        for (signal, value) in writes {
            if let Err(err) = signal.set(value) {
                first_error.get_or_insert(err);
            }
        }
        for shape in bumps {
            if let Err(err) = shape.update(|version| version.wrapping_add(1)) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("scope", &self.inner.scope.id())
            .field("value", &self.snapshot())
            .finish()
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn not_found(path: &Path) -> ReactiveError {
    ReactiveError::PathNotFound {
        path: path.to_string(),
    }
}

fn bad_index(path: &Path, segment: &str) -> ReactiveError {
    ReactiveError::InvalidPath {
        path: path.to_string(),
        reason: format!("`{segment}` is not an array index"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use serde_json::json;

    fn path(pointer: &str) -> Path {
        pointer.parse().unwrap()
    }

    fn user_store(rt: &Runtime) -> Store {
        Store::new(
            rt,
            json!({
                "user": { "name": "Ann", "age": 30 },
                "tags": ["a", "b"]
            }),
        )
    }

    #[test]
    fn get_reads_leaves_and_subtrees() {
        let rt = Runtime::new();
        let store = user_store(&rt);

        assert_eq!(store.get(&path("/user/name")).unwrap(), json!("Ann"));
        assert_eq!(store.get(&path("/tags/1")).unwrap(), json!("b"));
        assert_eq!(
            store.get(&path("/user")).unwrap(),
            json!({ "name": "Ann", "age": 30 })
        );
        assert_eq!(store.snapshot()["tags"], json!(["a", "b"]));
    }

    #[test]
    fn lookup_errors() {
        let rt = Runtime::new();
        let store = user_store(&rt);

        assert_eq!(
            store.get(&path("/user/email")),
            Err(ReactiveError::PathNotFound {
                path: "/user/email".into()
            })
        );
        assert_eq!(
            store.get(&path("/user/name/first")),
            Err(ReactiveError::NotAContainer {
                path: "/user/name".into()
            })
        );
        assert!(matches!(
            store.get(&path("/tags/first")),
            Err(ReactiveError::InvalidPath { .. })
        ));
        assert!(!store.contains(&path("/tags/2")));
    }

    #[test]
    fn sibling_writes_do_not_notify() {
        let rt = Runtime::new();
        let store = user_store(&rt);

        let reader = store.clone();
        let effect = Effect::new(&rt, move |_| {
            let _ = reader.get(&path("/user/name"));
        });

        store.set(&path("/user/age"), json!(31)).unwrap();
        assert_eq!(effect.run_count(), 1);

        store.set(&path("/user/name"), json!("Ann")).unwrap();
        assert_eq!(effect.run_count(), 1);

        store.set(&path("/user/name"), json!("Bea")).unwrap();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn adding_a_key_bumps_the_shape() {
        let rt = Runtime::new();
        let store = user_store(&rt);

        let reader = store.clone();
        let effect = Effect::new(&rt, move |_| {
            let _ = reader.get(&path("/user"));
        });

        store.set(&path("/user/email"), json!("ann@example.com")).unwrap();
        assert_eq!(effect.run_count(), 2);
        assert_eq!(
            store.get_untracked(&path("/user/email")).unwrap(),
            json!("ann@example.com")
        );
    }

    #[test]
    fn root_reconcile_only_touches_changed_leaves() {
        let rt = Runtime::new();
        let store = user_store(&rt);

        let reader = store.clone();
        let name_reader = Effect::new(&rt, move |_| {
            let _ = reader.get(&path("/user/name"));
        });

        store
            .set(
                &Path::root(),
                json!({ "user": { "name": "Ann", "age": 44 }, "tags": ["a", "b"] }),
            )
            .unwrap();

        assert_eq!(name_reader.run_count(), 1);
        assert_eq!(store.get(&path("/user/age")).unwrap(), json!(44));
    }

    #[test]
    fn kind_change_replaces_the_subtree() {
        let rt = Runtime::new();
        let store = user_store(&rt);
        let before = rt.node_count();

        store
            .set(&path("/user/name"), json!({ "first": "Ann", "last": "Lee" }))
            .unwrap();
        assert_eq!(store.get(&path("/user/name/last")).unwrap(), json!("Lee"));

        // One leaf replaced by an object with a shape and two leaves.
        assert_eq!(rt.node_count(), before + 2);

        store.set(&Path::root(), json!(7)).unwrap();
        assert_eq!(store.snapshot(), json!(7));
    }

    #[test]
    fn arrays_append_and_remove() {
        let rt = Runtime::new();
        let store = user_store(&rt);
        let tags = path("/tags");

        store.set(&tags.clone().append(), json!("c")).unwrap();
        store.set(&tags.clone().index(3), json!("d")).unwrap();
        assert_eq!(store.get(&tags).unwrap(), json!(["a", "b", "c", "d"]));

        assert_eq!(store.remove(&tags.clone().index(0)).unwrap(), json!("a"));
        assert_eq!(store.get(&tags).unwrap(), json!(["b", "c", "d"]));

        assert_eq!(
            store.set(&tags.clone().index(9), json!("z")),
            Err(ReactiveError::PathNotFound {
                path: "/tags/9".into()
            })
        );
    }

    #[test]
    fn remove_disposes_and_notifies() {
        let rt = Runtime::new();
        let store = user_store(&rt);

        let reader = store.clone();
        let effect = Effect::new(&rt, move |_| {
            let _ = reader.get(&path("/user/age"));
        });

        assert_eq!(store.remove(&path("/user/age")).unwrap(), json!(30));
        assert_eq!(effect.run_count(), 2);
        assert!(store.remove(&path("/user/age")).is_err());
        assert!(store.remove(&Path::root()).is_err());
    }

    #[test]
    fn rejected_set_leaves_the_document_unchanged() {
        let rt = Runtime::new();
        let store = Store::new(&rt, json!({ "a": 1, "b": { "c": 2 } }));
        let outcome = Rc::new(RefCell::new(None));

        // Writing /a from the effect that read it is a cycle
        let (writer, result) = (store.clone(), outcome.clone());
        let _effect = Effect::new(&rt, move |_| {
            let _ = writer.get(&path("/a"));
            if result.borrow().is_none() {
                let set = writer.set(&Path::root(), json!({ "a": 5, "b": { "c": 3, "d": 4 } }));
                *result.borrow_mut() = Some(set);
            }
        });
        let nodes = rt.node_count();

        assert!(matches!(
            *outcome.borrow(),
            Some(Err(ReactiveError::Cycle { .. }))
        ));
        assert_eq!(store.snapshot(), json!({ "a": 1, "b": { "c": 2 } }));
        assert!(!store.contains(&path("/b/d")));

        store
            .set(&Path::root(), json!({ "a": 5, "b": { "c": 3, "d": 4 } }))
            .unwrap();
        assert_eq!(
            store.snapshot(),
            json!({ "a": 5, "b": { "c": 3, "d": 4 } })
        );
        assert_eq!(rt.node_count(), nodes + 1);
    }

    #[test]
    fn rejected_remove_keeps_the_value() {
        let rt = Runtime::new();
        let store = user_store(&rt);
        let outcome = Rc::new(RefCell::new(None));

        let (writer, result) = (store.clone(), outcome.clone());
        let _effect = Effect::new(&rt, move |_| {
            let _ = writer.get(&path("/tags"));
            if result.borrow().is_none() {
                let removed = writer.remove(&path("/tags/0"));
                *result.borrow_mut() = Some(removed);
            }
        });

        assert!(matches!(
            *outcome.borrow(),
            Some(Err(ReactiveError::Cycle { .. }))
        ));
        assert_eq!(store.snapshot()["tags"], json!(["a", "b"]));
        assert_eq!(store.remove(&path("/tags/0")).unwrap(), json!("a"));
        assert_eq!(store.snapshot()["tags"], json!(["b"]));
    }

    #[test]
    fn update_uses_the_current_value() {
        let rt = Runtime::new();
        let store = user_store(&rt);

        store
            .update(&path("/user/age"), |age| json!(age.as_i64().unwrap_or(0) + 1))
            .unwrap();
        assert_eq!(store.get(&path("/user/age")).unwrap(), json!(31));
    }

    #[test]
    fn store_signals_survive_the_creating_effect() {
        let rt = Runtime::new();
        let trigger = crate::reactive::Signal::new(&rt, 0);
        let store = user_store(&rt);

        let (t, writer) = (trigger.clone(), store.clone());
        let _effect = Effect::new(&rt, move |_| {
            let n = t.get();
            let _ = writer.set(&path("/extra"), json!(n));
        });

        trigger.set(1).unwrap();
        assert_eq!(store.get(&path("/extra")).unwrap(), json!(1));
    }

    #[test]
    fn dispose_removes_every_signal() {
        let rt = Runtime::new();
        let before = rt.node_count();
        let store = user_store(&rt);
        assert!(rt.node_count() > before);

        store.dispose();
        assert_eq!(rt.node_count(), before);
        assert!(store.set(&path("/user/age"), json!(1)).is_err());
    }
}
