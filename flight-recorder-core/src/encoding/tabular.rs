use std::collections::{BTreeMap, BTreeSet};

use crate::models::error::{ProtocolFault, RecorderError};

/// Type name the remote side expects for a string-to-string map.
pub const STRING_MAP_TYPE_NAME: &str = "java.util.Map<java.lang.String, java.lang.String>";

const KEY_ITEM: &str = "key";
const VALUE_ITEM: &str = "value";

/// Row schema of a table: named string items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeType {
    type_name: String,
    item_names: Vec<String>,
}

impl CompositeType {
    pub fn new(type_name: &str, item_names: &[&str]) -> Result<Self, String> {
        if type_name.trim().is_empty() {
            return Err("composite type name is empty".into());
        }
        if item_names.is_empty() {
            return Err(format!("composite type {type_name} has no items"));
        }
        let unique: BTreeSet<&str> = item_names.iter().copied().collect();
        if unique.len() != item_names.len() {
            return Err(format!("composite type {type_name} has duplicate item names"));
        }
        if item_names.iter().any(|n| n.is_empty()) {
            return Err(format!("composite type {type_name} has an empty item name"));
        }
        Ok(Self {
            type_name: type_name.to_string(),
            item_names: item_names.iter().map(|n| n.to_string()).collect(),
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn item_names(&self) -> &[String] {
        &self.item_names
    }

    fn position(&self, item: &str) -> Option<usize> {
        self.item_names.iter().position(|n| n == item)
    }
}

/// Table schema: a row type plus the items that form the unique row index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularType {
    type_name: String,
    row_type: CompositeType,
    index_positions: Vec<usize>,
}

impl TabularType {
    pub fn new(type_name: &str, row_type: CompositeType, index_names: &[&str]) -> Result<Self, String> {
        if index_names.is_empty() {
            return Err(format!("tabular type {type_name} has no index"));
        }
        let index_positions = index_names
            .iter()
            .map(|name| {
                row_type
                    .position(name)
                    .ok_or_else(|| format!("index item {name:?} not in row type {}", row_type.type_name))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            type_name: type_name.to_string(),
            row_type,
            index_positions,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn row_type(&self) -> &CompositeType {
        &self.row_type
    }
}

/// One row of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeData {
    values: Vec<String>,
}

impl CompositeData {
    pub fn new(row_type: &CompositeType, values: Vec<String>) -> Result<Self, String> {
        if values.len() != row_type.item_names.len() {
            return Err(format!(
                "row for {} needs {} values, got {}",
                row_type.type_name,
                row_type.item_names.len(),
                values.len()
            ));
        }
        Ok(Self { values })
    }

    pub fn get(&self, row_type: &CompositeType, item: &str) -> Option<&str> {
        row_type
            .position(item)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }
}

/// Structured table value passed to the transport as a single argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularData {
    tabular_type: TabularType,
    rows: BTreeMap<Vec<String>, CompositeData>,
}

impl TabularData {
    pub fn new(tabular_type: TabularType) -> Self {
        Self {
            tabular_type,
            rows: BTreeMap::new(),
        }
    }

    /// Insert a row. Fails if the row does not fit this table's row type or
    /// another row already has the same index.
    pub fn put(&mut self, row: CompositeData) -> Result<(), String> {
        let row_type = &self.tabular_type.row_type;
        if row.values.len() != row_type.item_names.len() {
            return Err(format!(
                "row with {} values does not fit {} ({} items)",
                row.values.len(),
                row_type.type_name,
                row_type.item_names.len()
            ));
        }
        let index: Vec<String> = self
            .tabular_type
            .index_positions
            .iter()
            .map(|&i| row.values[i].clone())
            .collect();
        if self.rows.contains_key(&index) {
            return Err(format!("duplicate row index {index:?}"));
        }
        self.rows.insert(index, row);
        Ok(())
    }

    pub fn tabular_type(&self) -> &TabularType {
        &self.tabular_type
    }

    pub fn rows(&self) -> impl Iterator<Item = &CompositeData> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Encodes string maps into the tabular form the transport carries.
pub struct KeyValueEncoder;

impl KeyValueEncoder {
    /// Encode `map` as a table of `(key, value)` rows indexed by key.
    ///
    /// Only fails if the fixed row schema itself is malformed, which is a
    /// client defect rather than a runtime condition.
    pub fn encode(map: &BTreeMap<String, String>) -> Result<TabularData, RecorderError> {
        let defect = |msg: String| {
            RecorderError::internal("encoding key/value table", ProtocolFault::Defect(msg))
        };

        let row_type = CompositeType::new(STRING_MAP_TYPE_NAME, &[KEY_ITEM, VALUE_ITEM]).map_err(defect)?;
        let tabular_type = TabularType::new(STRING_MAP_TYPE_NAME, row_type, &[KEY_ITEM]).map_err(defect)?;
        let mut table = TabularData::new(tabular_type);

        for (key, value) in map {
            let row = CompositeData::new(table.tabular_type().row_type(), vec![key.clone(), value.clone()])
                .map_err(defect)?;
            table.put(row).map_err(defect)?;
        }
        Ok(table)
    }

    /// Inverse of [`encode`](Self::encode), used to check encodings in tests.
    #[cfg(test)]
    pub(crate) fn decode(table: &TabularData) -> BTreeMap<String, String> {
        let row_type = table.tabular_type().row_type();
        table
            .rows()
            .filter_map(|row| {
                let key = row.get(row_type, KEY_ITEM)?;
                let value = row.get(row_type, VALUE_ITEM)?;
                Some((key.to_string(), value.to_string()))
            })
            .collect()
    }
}
