use std::collections::HashMap;

/// A map that remembers the order in which keys were last written.
///
/// Inserting or overwriting a key moves it to the most-recent end. Iteration
/// yields entries from least-recently to most-recently written. The order
/// encodes view dependencies: a view written later may depend on views
/// written before it, so it is created last and dropped first.
#[derive(Debug, Clone)]
pub struct AccessOrderedMap<V> {
    entries: HashMap<String, V>,
    order: Vec<String>,
}

impl<V> Default for AccessOrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<V> AccessOrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`, moving it to the most-recent end.
    /// Returns the previous value, if any.
    pub fn insert(&mut self, key: String, value: V) -> Option<V> {
        let previous = self.entries.insert(key.clone(), value);
        if previous.is_some() {
            self.unlink(&key);
        }
        self.order.push(key);
        previous
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.unlink(key);
        }
        removed
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys from least-recently to most-recently written
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Entries from least-recently to most-recently written
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &V)> {
        self.order.iter().filter_map(|key| {
            self.entries
                .get(key)
                .map(|value| (key.as_str(), value))
        })
    }

    fn unlink(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }
}
