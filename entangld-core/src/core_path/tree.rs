/*
    PathStore - prefix tree of leaves

    Every path either names a leaf, an interior node, or nothing.
    A leaf never has children: inserting below a leaf turns it into an interior node,
    and inserting at an interior node drops its whole subtree.

    Reads come back as a `Lookup` so the caller can resolve getters without
    holding a borrow of the tree:
    - Leaf: the path names a leaf exactly
    - Nested: the path walks through a leaf; the remainder indexes into its resolved value
    - Branch: the path names an interior node; every descendant leaf is returned
    - Missing: nothing there
*/

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::leaf::Leaf;
use super::path::{Path, PathError};

#[derive(Debug, Default)]
struct Node {
    leaf: Option<Leaf>,
    children: BTreeMap<String, Node>,
}

/// Result of looking up a path in the tree
#[derive(Debug)]
pub enum Lookup {
    Leaf(Leaf),
    Nested { leaf: Leaf, rest: Path },
    /// Descendant leaves with paths relative to the looked-up node
    Branch(Vec<(Path, Leaf)>),
    Missing,
}

#[derive(Debug, Default)]
pub struct PathStore {
    root: Node,
}

impl PathStore {
    pub fn new() -> Self {
        PathStore::default()
    }

    /// Store `leaf` at `path`, replacing whatever was there
    pub fn insert(&mut self, path: &Path, leaf: Leaf) -> Result<(), PathError> {
        if path.is_root() {
            return Err(PathError::Root);
        }

        let mut node = &mut self.root;
        for segment in path.segments() {
            // a leaf on the way down becomes an interior node
            node.leaf = None;
            node = node.children.entry(segment.clone()).or_default();
        }

        node.children.clear();
        node.leaf = Some(leaf);
        Ok(())
    }

    pub fn lookup(&self, path: &Path) -> Lookup {
        let mut node = &self.root;
        let segments = path.segments();

        for (i, segment) in segments.iter().enumerate() {
            if let Some(leaf) = &node.leaf {
                return Lookup::Nested {
                    leaf: leaf.clone(),
                    rest: path.skip(i),
                };
            }
            match node.children.get(segment) {
                Some(child) => node = child,
                None => return Lookup::Missing,
            }
        }

        if let Some(leaf) = &node.leaf {
            return Lookup::Leaf(leaf.clone());
        }

        if node.children.is_empty() && !path.is_root() {
            return Lookup::Missing;
        }

        let mut leaves = Vec::new();
        collect(node, &Path::root(), &mut leaves);
        Lookup::Branch(leaves)
    }

    /// Literal currently stored at exactly `path`, if any
    pub fn literal(&self, path: &Path) -> Option<&Value> {
        let mut node = &self.root;
        for segment in path.segments() {
            node = node.children.get(segment)?;
        }
        node.leaf.as_ref().and_then(Leaf::as_literal)
    }

    /// Every leaf path in the tree
    pub fn paths(&self) -> Vec<Path> {
        let mut leaves = Vec::new();
        collect(&self.root, &Path::root(), &mut leaves);
        leaves.into_iter().map(|(path, _)| path).collect()
    }

}

fn collect(node: &Node, at: &Path, out: &mut Vec<(Path, Leaf)>) {
    if let Some(leaf) = &node.leaf {
        out.push((at.clone(), leaf.clone()));
        return;
    }
    for (segment, child) in &node.children {
        collect(child, &at.child(segment.clone()), out);
    }
}

/// Index into a resolved value by the remaining path segments.
///
/// Object members are looked up by key, array elements by decimal index.
pub fn descend(value: &Value, rest: &Path) -> Option<Value> {
    let mut current = value;
    for segment in rest.segments() {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

/// Build a JSON object out of resolved leaves keyed by relative path
pub fn assemble(entries: Vec<(Path, Value)>) -> Value {
    let mut root = Map::new();

    for (path, value) in entries {
        if path.is_root() {
            // the looked-up node is itself the leaf
            return value;
        }
        insert_nested(&mut root, path.segments(), value);
    }

    Value::Object(root)
}

fn insert_nested(map: &mut Map<String, Value>, segments: &[String], value: Value) {
    match segments {
        [] => {}
        [last] => {
            map.insert(last.clone(), value);
        }
        [first, rest @ ..] => {
            let slot = map
                .entry(first.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                insert_nested(inner, rest, value);
            }
        }
    }
}
