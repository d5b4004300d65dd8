use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a layer in the layout's layer table.
pub type LayerIndex = u32;

/// A (layer, datatype) pair identifying a drawing layer, GDS-II style.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LayerKey {
    pub layer: u16,
    pub datatype: u16,
}

impl LayerKey {
    pub fn new(layer: u16, datatype: u16) -> Self {
        Self { layer, datatype }
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.layer, self.datatype)
    }
}

/// A drawing layer registered in the layout's layer table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerInfo {
    pub key: LayerKey,
    pub name: String,
}

impl LayerInfo {
    pub fn new(key: LayerKey) -> Self {
        Self {
            key,
            name: String::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

/// The layout's layer table, mapping (layer, datatype) pairs to dense indices.
///
/// Indices are stable for the lifetime of the table; registering an existing
/// key returns the index already assigned to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerTable {
    layers: Vec<LayerInfo>,
}

impl LayerTable {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Register a layer, returning its index. Re-registering a key is a no-op
    /// that yields the existing index.
    pub fn insert(&mut self, info: LayerInfo) -> LayerIndex {
        if let Some(index) = self.find(info.key) {
            return index;
        }
        self.layers.push(info);
        (self.layers.len() - 1) as LayerIndex
    }

    /// Resolve a (layer, datatype) pair to its internal index.
    pub fn find(&self, key: LayerKey) -> Option<LayerIndex> {
        self.layers
            .iter()
            .position(|l| l.key == key)
            .map(|i| i as LayerIndex)
    }

    pub fn get(&self, index: LayerIndex) -> Option<&LayerInfo> {
        self.layers.get(index as usize)
    }

    pub fn get_mut(&mut self, index: LayerIndex) -> Option<&mut LayerInfo> {
        self.layers.get_mut(index as usize)
    }

    /// All registered (layer, datatype) pairs, in registration order.
    pub fn keys(&self) -> impl Iterator<Item = LayerKey> + '_ {
        self.layers.iter().map(|l| l.key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (LayerIndex, &LayerInfo)> {
        self.layers
            .iter()
            .enumerate()
            .map(|(i, l)| (i as LayerIndex, l))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_find() {
        let mut table = LayerTable::new();
        let metal1 = table.insert(LayerInfo::new(LayerKey::new(1, 0)).with_name("metal1"));
        let via1 = table.insert(LayerInfo::new(LayerKey::new(2, 0)));
        assert_ne!(metal1, via1);
        assert_eq!(table.find(LayerKey::new(1, 0)), Some(metal1));
        assert_eq!(table.find(LayerKey::new(1, 1)), None);
        assert_eq!(table.get(metal1).unwrap().name, "metal1");
    }

    #[test]
    fn test_reinsert_returns_existing_index() {
        let mut table = LayerTable::new();
        let first = table.insert(LayerInfo::new(LayerKey::new(7, 0)));
        let second = table.insert(LayerInfo::new(LayerKey::new(7, 0)));
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_keys_in_registration_order() {
        let mut table = LayerTable::new();
        table.insert(LayerInfo::new(LayerKey::new(3, 0)));
        table.insert(LayerInfo::new(LayerKey::new(1, 0)));
        let keys: Vec<LayerKey> = table.keys().collect();
        assert_eq!(keys, vec![LayerKey::new(3, 0), LayerKey::new(1, 0)]);
    }
}
