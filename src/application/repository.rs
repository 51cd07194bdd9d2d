//! Keyed in-memory repository

use std::collections::HashMap;

/// Entities keyed by id, kept in process memory
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRepository<T> {
    entities: HashMap<String, T>,
}

impl<T: Clone> ObjectRepository<T> {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
        }
    }

    pub fn from_map(entities: HashMap<String, T>) -> Self {
        Self { entities }
    }

    pub fn find_by_id(&self, id: &str) -> Option<&T> {
        self.entities.get(id)
    }

    pub fn find_all(&self) -> Vec<T> {
        self.entities.values().cloned().collect()
    }

    /// Insert or replace; returns the previous value
    pub fn upsert_by_id(&mut self, id: impl Into<String>, entity: T) -> Option<T> {
        self.entities.insert(id.into(), entity)
    }

    pub fn delete_by_id(&mut self, id: &str) -> bool {
        self.entities.remove(id).is_some()
    }

    pub fn count(&self) -> usize {
        self.entities.len()
    }

    pub fn to_json(&self) -> HashMap<String, T> {
        self.entities.clone()
    }
}

impl<T: Clone> Default for ObjectRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Label;

    #[test]
    fn test_repository_crud() {
        let mut repo = ObjectRepository::new();
        assert!(repo.upsert_by_id("1", Label::new("1", "New customer")).is_none());
        assert!(repo.upsert_by_id("1", Label::new("1", "Customer")).is_some());
        repo.upsert_by_id("2", Label::new("2", "Paid"));

        assert_eq!(repo.count(), 2);
        assert_eq!(repo.find_by_id("1").unwrap().name, "Customer");
        assert!(repo.delete_by_id("2"));
        assert!(!repo.delete_by_id("2"));
        assert_eq!(repo.to_json().len(), 1);
    }
}
