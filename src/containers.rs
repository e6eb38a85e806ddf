// File: src/containers.rs
//
// Container types backing the List and Map value kinds.
// Lists are dense, zero-indexed, and grow on append; maps keep insertion
// order and look keys up case-insensitively.

use ahash::AHashMap;

use crate::value::Value;

/// Ordered, mutable array of script values.
///
/// Also exposes a "sorted set" view (`set_add` / `set_remove` /
/// `set_contains` / `set_search`): binary-search operations that are only
/// meaningful on a list kept sorted through them.
#[derive(Debug, Default)]
pub struct ScriptList {
    values: Vec<Value>,
}

impl ScriptList {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { values: Vec::with_capacity(capacity) }
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Grows by appending Null slots, shrinks by dropping them.
    pub fn set_size(&mut self, size: usize) {
        if size < self.values.len() {
            self.values.truncate(size);
        } else {
            self.values.resize(size, Value::Null);
        }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Out-of-range writes fail silently.
    pub fn set(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    pub fn add(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Inserts, clamping `index` to `[0, len]`.
    pub fn add_at(&mut self, index: usize, value: Value) {
        let index = index.min(self.values.len());
        self.values.insert(index, value);
    }

    pub fn remove_at(&mut self, index: usize) -> Option<Value> {
        if index < self.values.len() {
            Some(self.values.remove(index))
        } else {
            None
        }
    }

    /// Removes the first element strictly equal to `value`.
    pub fn remove(&mut self, value: &Value) -> bool {
        match self.index_of(value) {
            Some(index) => {
                self.values.remove(index);
                true
            }
            None => false,
        }
    }

    /// Linear scan by strict equality.
    pub fn index_of(&self, value: &Value) -> Option<usize> {
        self.values.iter().position(|v| v.strict_equals(value))
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.index_of(value).is_some()
    }

    /// Sorts in natural value order, unordered results (NaN) last.
    pub fn sort(&mut self) {
        self.values.sort_by(|a, b| a.total_compare(b));
    }

    /// Inserts into a sorted list, keeping it sorted. Returns false if an
    /// equal element is already present.
    pub fn set_add(&mut self, value: Value) -> bool {
        match self.search(&value) {
            Ok(_) => false,
            Err(index) => {
                self.values.insert(index, value);
                true
            }
        }
    }

    /// Removes from a sorted list by binary search.
    pub fn set_remove(&mut self, value: &Value) -> bool {
        match self.search(value) {
            Ok(index) => {
                self.values.remove(index);
                true
            }
            Err(_) => false,
        }
    }

    pub fn set_contains(&self, value: &Value) -> bool {
        self.search(value).is_ok()
    }

    /// Binary search; returns the index of an equal element, or None.
    pub fn set_search(&self, value: &Value) -> Option<usize> {
        self.search(value).ok()
    }

    fn search(&self, value: &Value) -> Result<usize, usize> {
        self.values.binary_search_by(|probe| probe.total_compare(value))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Value> {
        self.values.iter_mut()
    }

    /// Recursive deep copy of every element.
    pub fn deep_copy(&self) -> ScriptList {
        ScriptList { values: self.values.iter().map(Value::copy).collect() }
    }
}

#[derive(Debug, Clone)]
struct MapEntry {
    key: String,
    value: Value,
}

/// Insertion-ordered map with case-insensitive String keys.
///
/// Lookup goes through an index keyed by the lowercased key; the original
/// insertion-case spelling is what iteration yields. Overwriting an entry
/// keeps its position and spelling.
#[derive(Debug, Default)]
pub struct ScriptMap {
    entries: Vec<MapEntry>,
    index: AHashMap<String, usize>,
}

impl ScriptMap {
    pub fn new() -> Self {
        Self { entries: Vec::new(), index: AHashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set(&mut self, key: &str, value: Value) {
        let folded = key.to_ascii_lowercase();
        match self.index.get(&folded) {
            Some(&slot) => self.entries[slot].value = value,
            None => {
                self.index.insert(folded, self.entries.len());
                self.entries.push(MapEntry { key: key.to_string(), value });
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        let folded = key.to_ascii_lowercase();
        self.index.get(&folded).map(|&slot| &self.entries[slot].value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(&key.to_ascii_lowercase())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let folded = key.to_ascii_lowercase();
        let slot = self.index.remove(&folded)?;
        let entry = self.entries.remove(slot);
        for index in self.index.values_mut() {
            if *index > slot {
                *index -= 1;
            }
        }
        Some(entry.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Iterates in insertion order, yielding the insertion-case keys.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|e| (e.key.as_str(), &e.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    /// Recursive deep copy of every entry.
    pub fn deep_copy(&self) -> ScriptMap {
        let mut copy = ScriptMap::new();
        for (key, value) in self.iter() {
            copy.set(key, value.copy());
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_set_out_of_range_is_silent() {
        let mut list = ScriptList::from_values(vec![Value::Integer(1)]);
        list.set(5, Value::Integer(9));
        assert_eq!(list.len(), 1);
        assert!(list.get(0).unwrap().strict_equals(&Value::Integer(1)));
    }

    #[test]
    fn test_list_add_at_clamps() {
        let mut list = ScriptList::new();
        list.add(Value::Integer(1));
        list.add_at(100, Value::Integer(2));
        list.add_at(0, Value::Integer(0));
        let collected: Vec<i64> = list.iter().map(|v| v.as_long()).collect();
        assert_eq!(collected, vec![0, 1, 2]);
    }

    #[test]
    fn test_list_set_size() {
        let mut list = ScriptList::from_values(vec![Value::Integer(1), Value::Integer(2)]);
        list.set_size(4);
        assert_eq!(list.len(), 4);
        assert!(list.get(3).unwrap().is_null());
        list.set_size(1);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_list_sorted_set_view() {
        let mut list = ScriptList::new();
        assert!(list.set_add(Value::Integer(5)));
        assert!(list.set_add(Value::Integer(1)));
        assert!(list.set_add(Value::Integer(3)));
        assert!(!list.set_add(Value::Integer(3)));
        let collected: Vec<i64> = list.iter().map(|v| v.as_long()).collect();
        assert_eq!(collected, vec![1, 3, 5]);
        assert!(list.set_contains(&Value::Integer(3)));
        assert_eq!(list.set_search(&Value::Integer(5)), Some(2));
        assert!(list.set_remove(&Value::Integer(1)));
        assert!(!list.set_remove(&Value::Integer(1)));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_map_case_insensitive_lookup_keeps_spelling() {
        let mut map = ScriptMap::new();
        map.set("Alpha", Value::Integer(1));
        assert!(map.contains_key("ALPHA"));
        assert_eq!(map.get("alpha").unwrap().as_long(), 1);

        map.set("ALPHA", Value::Integer(2));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("Alpha").unwrap().as_long(), 2);
        // Original insertion-case key is retained for iteration.
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["Alpha"]);
    }

    #[test]
    fn test_map_insertion_order_survives_removal() {
        let mut map = ScriptMap::new();
        map.set("a", Value::Integer(1));
        map.set("b", Value::Integer(2));
        map.set("c", Value::Integer(3));
        map.remove("b");
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(map.get("c").unwrap().as_long(), 3);
    }
}
