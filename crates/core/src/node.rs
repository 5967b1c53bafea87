//! Property tree data model
//!
//! This module defines:
//! - PropertyValue: tagged variant holding a scalar or a child collection
//! - PropertyNode: one entry in the tree, an optional key plus a value
//! - Properties: the mutable dictionary builder used by client code
//!
//! ## Ownership
//!
//! Nodes are shared by reference: every node is handled as an
//! `Arc<PropertyNode>`, and the `Arc` strong count plays the role of the
//! reference count. Creation starts the count at 1, insertion into a
//! parent clones the `Arc` (count + 1), dropping a handle releases it
//! (count - 1), and the node with everything it owns is freed exactly
//! once when the count reaches zero. Double frees and dangling aliases
//! are unrepresentable. The count is atomic, so finished (immutable)
//! nodes may be shared across threads; mutation happens only through a
//! `Properties` builder, which is single-owner.
//!
//! ## Child order
//!
//! Dictionaries and lists keep their children most-recently-added-first.
//! This LIFO order is observable in JSON output and is preserved
//! exactly; do not "fix" it to insertion order.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::utf8;

/// Upper bound, in bytes, of key comparisons in child lookup/removal
///
/// Keys compare equal when their first 256 bytes compare equal; longer
/// keys are not fully compared. This is a documented boundary quirk of
/// the data model (key *validation* elsewhere caps names at 255 bytes,
/// one byte shy of this limit), kept verbatim rather than silently
/// tightened.
pub const KEY_COMPARE_LIMIT: usize = 256;

/// Compare two keys under the [`KEY_COMPARE_LIMIT`] bound
pub fn keys_equal(a: &str, b: &str) -> bool {
    let a = &a.as_bytes()[..a.len().min(KEY_COMPARE_LIMIT)];
    let b = &b.as_bytes()[..b.len().min(KEY_COMPARE_LIMIT)];
    a == b
}

/// Tagged value held by a [`PropertyNode`]
///
/// The tag never changes after construction and values are immutable:
/// an update replaces the node, it does not mutate it.
#[derive(Debug)]
pub enum PropertyValue {
    /// Boolean property
    Bool(bool),
    /// Floating-point property, rendered with fixed 3-decimal precision
    Number(f64),
    /// Integer property
    Int(i64),
    /// Timestamp property: epoch seconds plus a sub-second field
    ///
    /// The sub-second field is named `microseconds` for compatibility
    /// with the wire format's producers, but it is rendered verbatim as
    /// the 3-digit group after the decimal point.
    Date {
        /// Seconds since the Unix epoch
        seconds: i64,
        /// Sub-second field, printed as a 3-digit group
        microseconds: i32,
    },
    /// String property; the bytes are UTF-8 (validated on entry)
    String(Vec<u8>),
    /// Ordered child collection without keys, most-recently-added first
    List(Vec<Arc<PropertyNode>>),
    /// Ordered child collection with unique keys, most-recently-added first
    Dict(Vec<Arc<PropertyNode>>),
}

/// One entry in the property tree
///
/// A node carries an optional key (absent for list elements and the
/// synthetic record root) and a tagged value. Nodes are always handled
/// as `Arc<PropertyNode>`; see the module docs for the ownership model.
#[derive(Debug)]
pub struct PropertyNode {
    pub(crate) key: Option<String>,
    pub(crate) value: PropertyValue,
}

impl PropertyNode {
    fn with_value(key: Option<&str>, value: PropertyValue) -> Arc<Self> {
        Arc::new(PropertyNode {
            key: key.map(str::to_owned),
            value,
        })
    }

    /// Create a boolean node
    pub fn new_bool(key: Option<&str>, value: bool) -> Arc<Self> {
        Self::with_value(key, PropertyValue::Bool(value))
    }

    /// Create a floating-point number node
    pub fn new_number(key: Option<&str>, value: f64) -> Arc<Self> {
        Self::with_value(key, PropertyValue::Number(value))
    }

    /// Create an integer node
    pub fn new_int(key: Option<&str>, value: i64) -> Arc<Self> {
        Self::with_value(key, PropertyValue::Int(value))
    }

    /// Create a date node from epoch seconds and the sub-second field
    pub fn new_date(key: Option<&str>, seconds: i64, microseconds: i32) -> Arc<Self> {
        Self::with_value(
            key,
            PropertyValue::Date {
                seconds,
                microseconds,
            },
        )
    }

    /// Create a string node from a Rust string (always valid UTF-8)
    pub fn new_string(key: Option<&str>, value: &str) -> Arc<Self> {
        Self::with_value(key, PropertyValue::String(value.as_bytes().to_vec()))
    }

    /// Create a string node from raw bytes, validating them as UTF-8
    ///
    /// Returns [`Error::InvalidUtf8`] without constructing anything when
    /// the bytes are not well-formed; no partial state is committed.
    pub fn new_string_bytes(key: Option<&str>, bytes: Vec<u8>) -> Result<Arc<Self>> {
        if !utf8::validate(&bytes) {
            return Err(Error::InvalidUtf8);
        }
        Ok(Self::with_value(key, PropertyValue::String(bytes)))
    }

    /// Create an empty list node
    pub fn new_list(key: Option<&str>) -> Arc<Self> {
        Self::with_value(key, PropertyValue::List(Vec::new()))
    }

    /// Create an empty dictionary node
    pub fn new_dict(key: Option<&str>) -> Arc<Self> {
        Self::with_value(key, PropertyValue::Dict(Vec::new()))
    }

    /// The node's key, if it has one
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The node's tagged value
    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    /// The tag name, for error messages
    pub fn tag_name(&self) -> &'static str {
        match self.value {
            PropertyValue::Bool(_) => "Bool",
            PropertyValue::Number(_) => "Number",
            PropertyValue::Int(_) => "Int",
            PropertyValue::Date { .. } => "Date",
            PropertyValue::String(_) => "String",
            PropertyValue::List(_) => "List",
            PropertyValue::Dict(_) => "Dict",
        }
    }

    /// String content, when this is a String node with valid UTF-8 bytes
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            PropertyValue::String(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    /// Date fields `(seconds, microseconds)`, when this is a Date node
    pub fn as_date(&self) -> Option<(i64, i32)> {
        match self.value {
            PropertyValue::Date {
                seconds,
                microseconds,
            } => Some((seconds, microseconds)),
            _ => None,
        }
    }

    /// Look up a child by key in a dictionary node
    ///
    /// Linear scan with the [`KEY_COMPARE_LIMIT`]-bounded comparison.
    /// Returns `None` for non-dictionary nodes.
    pub fn get_child(&self, key: &str) -> Option<&Arc<PropertyNode>> {
        match &self.value {
            PropertyValue::Dict(children) => children
                .iter()
                .find(|c| c.key().is_some_and(|k| keys_equal(k, key))),
            _ => None,
        }
    }
}

/// Mutable dictionary builder
///
/// `Properties` is the write surface of the tree: client code adds
/// scalar properties, appends to list properties, and finally freezes
/// the builder into an immutable Dict node with [`into_node`]. Children
/// are stored most-recently-added-first, and inserting a child whose key
/// matches an existing child removes the old one first
/// (replace-on-duplicate-key).
///
/// Cloning a `Properties` is shallow: the clone shares every child node
/// by reference, which is exactly what the default-properties snapshot
/// wants.
///
/// [`into_node`]: Properties::into_node
#[derive(Debug, Clone, Default)]
pub struct Properties {
    children: Vec<Arc<PropertyNode>>,
}

impl Properties {
    /// Create an empty property set
    pub fn new() -> Self {
        Properties {
            children: Vec::new(),
        }
    }

    /// Number of properties currently held
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// True when no properties are held
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Iterate children in stored (most-recently-added-first) order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<PropertyNode>> {
        self.children.iter()
    }

    /// Insert a child, sharing ownership with the caller
    ///
    /// Fails when the child has no key. Any existing child with an equal
    /// key (under the bounded comparison) is removed and released first;
    /// the new child then becomes the head of the child sequence.
    pub fn insert(&mut self, child: Arc<PropertyNode>) -> Result<()> {
        let key = child.key().ok_or_else(|| {
            Error::InvalidParameter(
                "a property without a key cannot be inserted into a dictionary".to_string(),
            )
        })?;
        self.remove(key);
        self.children.insert(0, child);
        Ok(())
    }

    /// Look up a child by key
    pub fn get(&self, key: &str) -> Option<&Arc<PropertyNode>> {
        self.children
            .iter()
            .find(|c| c.key().is_some_and(|k| keys_equal(k, key)))
    }

    /// Remove and release every child whose key matches
    pub fn remove(&mut self, key: &str) {
        self.children
            .retain(|c| !c.key().is_some_and(|k| keys_equal(k, key)));
    }

    /// Remove and release all children
    pub fn clear(&mut self) {
        self.children.clear();
    }

    /// Add a boolean property
    pub fn add_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.insert(PropertyNode::new_bool(Some(key), value))
    }

    /// Add a floating-point number property
    pub fn add_number(&mut self, key: &str, value: f64) -> Result<()> {
        self.insert(PropertyNode::new_number(Some(key), value))
    }

    /// Add an integer property
    pub fn add_int(&mut self, key: &str, value: i64) -> Result<()> {
        self.insert(PropertyNode::new_int(Some(key), value))
    }

    /// Add a date property from epoch seconds and the sub-second field
    pub fn add_date(&mut self, key: &str, seconds: i64, microseconds: i32) -> Result<()> {
        self.insert(PropertyNode::new_date(Some(key), seconds, microseconds))
    }

    /// Add a date property from a timestamp
    ///
    /// The sub-second field is filled with the timestamp's millisecond
    /// part, which is what the wire format renders.
    pub fn add_datetime<Tz: chrono::TimeZone>(
        &mut self,
        key: &str,
        value: chrono::DateTime<Tz>,
    ) -> Result<()> {
        self.add_date(
            key,
            value.timestamp(),
            value.timestamp_subsec_millis() as i32,
        )
    }

    /// Add a string property
    pub fn add_string(&mut self, key: &str, value: &str) -> Result<()> {
        self.insert(PropertyNode::new_string(Some(key), value))
    }

    /// Append a string element to the list property under `key`
    ///
    /// Get-or-create: when no list child exists under `key` a new one is
    /// created and inserted; when one exists the element is added to it
    /// in place, leaving the list at its original position in the
    /// dictionary. This is the one append path that does not go through
    /// replace-on-duplicate-key removal. Fails when `key` names an
    /// existing non-list property.
    pub fn append_list(&mut self, key: &str, element: &str) -> Result<()> {
        let element = PropertyNode::new_string(None, element);

        let pos = self
            .children
            .iter()
            .position(|c| c.key().is_some_and(|k| keys_equal(k, key)));

        match pos {
            Some(pos) => {
                let existing = &self.children[pos];
                let items = match existing.value() {
                    PropertyValue::List(items) => items,
                    _ => {
                        return Err(Error::InvalidParameter(format!(
                            "property {:?} is a {}, not a List",
                            key,
                            existing.tag_name()
                        )))
                    }
                };
                // Nodes are immutable: rebuild the list with the new
                // element at its head and swap it into the same slot.
                let mut items = items.clone();
                items.insert(0, element);
                self.children[pos] =
                    PropertyNode::with_value(existing.key(), PropertyValue::List(items));
            }
            None => {
                let list = PropertyNode::with_value(Some(key), PropertyValue::List(vec![element]));
                self.insert(list)?;
            }
        }
        Ok(())
    }

    /// Freeze the builder into an immutable dictionary node
    pub fn into_node(self, key: Option<&str>) -> Arc<PropertyNode> {
        PropertyNode::with_value(key, PropertyValue::Dict(self.children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_tag_and_key() {
        let n = PropertyNode::new_bool(Some("flag"), true);
        assert_eq!(n.key(), Some("flag"));
        assert!(matches!(n.value(), PropertyValue::Bool(true)));

        let n = PropertyNode::new_string(None, "hello");
        assert_eq!(n.key(), None);
        assert_eq!(n.as_str(), Some("hello"));

        let n = PropertyNode::new_date(Some("when"), 1500000000, 250);
        assert_eq!(n.as_date(), Some((1500000000, 250)));
    }

    #[test]
    fn test_new_string_bytes_rejects_invalid_utf8() {
        let err = PropertyNode::new_string_bytes(None, vec![0xED, 0xA0, 0x80]).unwrap_err();
        assert!(matches!(err, Error::InvalidUtf8));
        assert!(PropertyNode::new_string_bytes(None, b"ok".to_vec()).is_ok());
    }

    #[test]
    fn test_insert_requires_key() {
        let mut props = Properties::new();
        let err = props.insert(PropertyNode::new_int(None, 1)).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert!(props.is_empty());
    }

    #[test]
    fn test_insert_is_lifo() {
        let mut props = Properties::new();
        props.add_int("first", 1).unwrap();
        props.add_int("second", 2).unwrap();
        props.add_int("third", 3).unwrap();
        let keys: Vec<_> = props.iter().map(|c| c.key().unwrap()).collect();
        assert_eq!(keys, ["third", "second", "first"]);
    }

    #[test]
    fn test_insert_replaces_duplicate_key() {
        let mut props = Properties::new();
        props.add_int("k", 1).unwrap();
        props.add_int("other", 0).unwrap();

        // Keep an alias of the node about to be replaced.
        let old = Arc::clone(props.get("k").unwrap());
        assert_eq!(Arc::strong_count(&old), 2);

        props.add_int("k", 2).unwrap();
        assert_eq!(props.len(), 2);
        let replaced = props.get("k").unwrap();
        assert!(matches!(replaced.value(), PropertyValue::Int(2)));

        // The old node was released by the dictionary; only the alias
        // keeps it alive, and it is still fully usable.
        assert_eq!(Arc::strong_count(&old), 1);
        assert!(matches!(old.value(), PropertyValue::Int(1)));
    }

    #[test]
    fn test_shared_node_released_exactly_once() {
        let node = PropertyNode::new_string(Some("shared"), "v");
        let mut a = Properties::new();
        let mut b = Properties::new();
        a.insert(Arc::clone(&node)).unwrap();
        b.insert(Arc::clone(&node)).unwrap();
        assert_eq!(Arc::strong_count(&node), 3);

        drop(a);
        assert_eq!(Arc::strong_count(&node), 2);
        assert_eq!(b.get("shared").unwrap().as_str(), Some("v"));

        drop(b);
        assert_eq!(Arc::strong_count(&node), 1);
        assert_eq!(node.as_str(), Some("v"));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut props = Properties::new();
        props.add_int("a", 1).unwrap();
        props.add_int("b", 2).unwrap();
        props.remove("a");
        assert!(props.get("a").is_none());
        assert_eq!(props.len(), 1);
        props.clear();
        assert!(props.is_empty());
    }

    #[test]
    fn test_key_comparison_is_bounded_at_256_bytes() {
        let long_a = format!("{}{}", "k".repeat(KEY_COMPARE_LIMIT), "alpha");
        let long_b = format!("{}{}", "k".repeat(KEY_COMPARE_LIMIT), "beta");
        assert_ne!(long_a, long_b);
        // Equal in their first 256 bytes, so the dictionary treats them
        // as the same key.
        assert!(keys_equal(&long_a, &long_b));

        let mut props = Properties::new();
        props.add_int(&long_a, 1).unwrap();
        props.add_int(&long_b, 2).unwrap();
        assert_eq!(props.len(), 1);
        assert!(matches!(
            props.get(&long_a).unwrap().value(),
            PropertyValue::Int(2)
        ));

        // Short keys still compare exactly.
        assert!(!keys_equal("ka", "kb"));
    }

    #[test]
    fn test_append_list_get_or_create() {
        let mut props = Properties::new();
        props.add_int("before", 0).unwrap();
        props.append_list("tags", "a").unwrap();
        props.add_int("after", 0).unwrap();
        props.append_list("tags", "b").unwrap();

        // Exactly one list child named "tags".
        let tags: Vec<_> = props
            .iter()
            .filter(|c| c.key() == Some("tags"))
            .collect();
        assert_eq!(tags.len(), 1);

        let items = match tags[0].value() {
            PropertyValue::List(items) => items,
            other => panic!("expected a list, got {:?}", other),
        };
        let values: Vec<_> = items.iter().map(|i| i.as_str().unwrap()).collect();
        assert_eq!(values, ["b", "a"]);

        // The second append did not move the list to the head: the
        // later "after" property still sits in front of it.
        let keys: Vec<_> = props.iter().map(|c| c.key().unwrap()).collect();
        assert_eq!(keys, ["after", "tags", "before"]);
    }

    #[test]
    fn test_append_list_rejects_non_list_property() {
        let mut props = Properties::new();
        props.add_int("tags", 7).unwrap();
        let err = props.append_list("tags", "a").unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        // The scalar is untouched.
        assert!(matches!(
            props.get("tags").unwrap().value(),
            PropertyValue::Int(7)
        ));
    }

    #[test]
    fn test_get_child_on_dict_node() {
        let mut props = Properties::new();
        props.add_string("name", "beacon").unwrap();
        let dict = props.into_node(Some("root"));
        assert_eq!(dict.get_child("name").unwrap().as_str(), Some("beacon"));
        assert!(dict.get_child("missing").is_none());

        let scalar = PropertyNode::new_int(Some("n"), 1);
        assert!(scalar.get_child("n").is_none());
    }

    #[test]
    fn test_clone_shares_children() {
        let mut props = Properties::new();
        props.add_string("k", "v").unwrap();
        let node = Arc::clone(props.get("k").unwrap());
        let snapshot = props.clone();
        assert_eq!(Arc::strong_count(&node), 3);
        drop(props);
        assert_eq!(snapshot.get("k").unwrap().as_str(), Some("v"));
    }

    #[test]
    fn test_into_node_freezes_children() {
        let mut props = Properties::new();
        props.add_int("a", 1).unwrap();
        props.add_int("b", 2).unwrap();
        let node = props.into_node(None);
        assert_eq!(node.key(), None);
        match node.value() {
            PropertyValue::Dict(children) => {
                let keys: Vec<_> = children.iter().map(|c| c.key().unwrap()).collect();
                assert_eq!(keys, ["b", "a"]);
            }
            other => panic!("expected a dict, got {:?}", other),
        }
    }
}
