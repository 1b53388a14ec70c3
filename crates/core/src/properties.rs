//! Typed property values and per-interface property bags.
//!
//! The test service attaches named interfaces to each of its objects;
//! each interface carries a bag of properties. The bus delivers these
//! as dynamically-typed values, which this module models as an explicit
//! [`PropertyValue`] variant so that a missing key or a value of the
//! wrong shape is a typed error rather than a silent cast.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::path::ObjectPath;

/// A single dynamically-typed property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// A plain string.
    Str(String),
    /// A boolean flag.
    Bool(bool),
    /// A bus object path.
    Path(ObjectPath),
    /// An ordered list of values.
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Short type label used in [`PropertyError::WrongType`].
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Str(_) => "str",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Path(_) => "path",
            PropertyValue::List(_) => "list",
        }
    }
}

/// Accessor failures on a [`PropertyBag`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropertyError {
    /// The bag has no property with the requested name.
    #[error("property \"{0}\" is missing")]
    Missing(String),

    /// The property exists but holds a different value variant.
    #[error("property \"{name}\" has type {actual}, expected {expected}")]
    WrongType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// An ordered mapping from property name to [`PropertyValue`].
///
/// One bag per interface per object. Iteration order is the property
/// name order, which keeps discovery logs and tests deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag(BTreeMap<String, PropertyValue>);

impl PropertyBag {
    /// An empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a property, replacing any previous value under the name.
    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.0.insert(name.into(), value);
    }

    /// Raw lookup without type checking.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    /// Fetch a string property.
    pub fn get_str(&self, name: &str) -> Result<&str, PropertyError> {
        match self.require(name)? {
            PropertyValue::Str(s) => Ok(s),
            other => Err(self.wrong_type(name, "str", other)),
        }
    }

    /// Fetch a boolean property.
    pub fn get_bool(&self, name: &str) -> Result<bool, PropertyError> {
        match self.require(name)? {
            PropertyValue::Bool(b) => Ok(*b),
            other => Err(self.wrong_type(name, "bool", other)),
        }
    }

    /// Fetch an object-path property.
    pub fn get_path(&self, name: &str) -> Result<&ObjectPath, PropertyError> {
        match self.require(name)? {
            PropertyValue::Path(p) => Ok(p),
            other => Err(self.wrong_type(name, "path", other)),
        }
    }

    /// Fetch a list property.
    pub fn get_list(&self, name: &str) -> Result<&[PropertyValue], PropertyError> {
        match self.require(name)? {
            PropertyValue::List(items) => Ok(items),
            other => Err(self.wrong_type(name, "list", other)),
        }
    }

    /// Fetch a list of object paths, the shape used by the session
    /// `run_list` and `job_list` properties.
    pub fn get_path_list(&self, name: &str) -> Result<Vec<ObjectPath>, PropertyError> {
        let items = self.get_list(name)?;
        let mut paths = Vec::with_capacity(items.len());
        for item in items {
            match item {
                PropertyValue::Path(p) => paths.push(p.clone()),
                other => return Err(self.wrong_type(name, "path", other)),
            }
        }
        Ok(paths)
    }

    /// Whether the bag holds no properties.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of properties in the bag.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate properties in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.0.iter()
    }

    fn require(&self, name: &str) -> Result<&PropertyValue, PropertyError> {
        self.0
            .get(name)
            .ok_or_else(|| PropertyError::Missing(name.to_string()))
    }

    fn wrong_type(&self, name: &str, expected: &'static str, actual: &PropertyValue) -> PropertyError {
        PropertyError::WrongType {
            name: name.to_string(),
            expected,
            actual: actual.type_name(),
        }
    }
}

impl FromIterator<(String, PropertyValue)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bag() -> PropertyBag {
        let mut bag = PropertyBag::new();
        bag.insert("name", PropertyValue::Str("Disk SMART check".into()));
        bag.insert("automated", PropertyValue::Bool(true));
        bag.insert(
            "via",
            PropertyValue::Path(ObjectPath::new("/plainbox/job/disk_local")),
        );
        bag.insert(
            "run_list",
            PropertyValue::List(vec![
                PropertyValue::Path(ObjectPath::new("/plainbox/job/a")),
                PropertyValue::Path(ObjectPath::new("/plainbox/job/b")),
            ]),
        );
        bag
    }

    #[test]
    fn typed_accessors_return_values() {
        let bag = sample_bag();
        assert_eq!(bag.get_str("name").unwrap(), "Disk SMART check");
        assert!(bag.get_bool("automated").unwrap());
        assert_eq!(
            bag.get_path("via").unwrap().as_str(),
            "/plainbox/job/disk_local"
        );
        assert_eq!(bag.get_list("run_list").unwrap().len(), 2);
    }

    #[test]
    fn missing_key_is_explicit() {
        let bag = sample_bag();
        assert_eq!(
            bag.get_str("plugin"),
            Err(PropertyError::Missing("plugin".to_string()))
        );
    }

    #[test]
    fn wrong_type_names_both_types() {
        let bag = sample_bag();
        assert_eq!(
            bag.get_bool("name"),
            Err(PropertyError::WrongType {
                name: "name".to_string(),
                expected: "bool",
                actual: "str",
            })
        );
    }

    #[test]
    fn path_list_unpacks_paths() {
        let bag = sample_bag();
        let paths = bag.get_path_list("run_list").unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].as_str(), "/plainbox/job/a");
    }

    #[test]
    fn path_list_rejects_mixed_list() {
        let mut bag = PropertyBag::new();
        bag.insert(
            "run_list",
            PropertyValue::List(vec![PropertyValue::Str("not a path".into())]),
        );
        assert!(bag.get_path_list("run_list").is_err());
    }

    #[test]
    fn value_round_trips_through_json() {
        let value = PropertyValue::List(vec![
            PropertyValue::Str("local".into()),
            PropertyValue::Bool(false),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        let back: PropertyValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
