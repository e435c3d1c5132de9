// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Registry of index schemas, resolvable by name or by document key.
//!
//! # Design
//!
//! - **Longest prefix match**: more specific key prefixes take precedence
//! - **Shared schemas**: lookups hand out `Arc<IndexSchema>`
//! - **Thread-safe**: uses `parking_lot::RwLock` for concurrent access

use std::sync::Arc;

use parking_lot::RwLock;

use super::IndexSchema;

/// Registry mapping index names and key prefixes to schemas.
///
/// Thread-safe for concurrent reads with occasional writes.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    /// Registered schemas, sorted by key prefix length (descending).
    schemas: RwLock<Vec<Arc<IndexSchema>>>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema, replacing any schema with the same index name.
    pub fn register(&self, schema: IndexSchema) -> Arc<IndexSchema> {
        let schema = Arc::new(schema);
        let mut schemas = self.schemas.write();

        if let Some(pos) = schemas.iter().position(|s| s.name() == schema.name()) {
            schemas[pos] = schema.clone();
        } else {
            schemas.push(schema.clone());
        }

        schemas.sort_by(|a, b| b.prefix().len().cmp(&a.prefix().len()));
        schema
    }

    /// Remove a schema by index name.
    ///
    /// Returns `true` if it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut schemas = self.schemas.write();
        if let Some(pos) = schemas.iter().position(|s| s.name() == name) {
            schemas.remove(pos);
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<IndexSchema>> {
        self.schemas.read().iter().find(|s| s.name() == name).cloned()
    }

    /// Find the schema whose key prefix covers `key`.
    ///
    /// Uses longest-prefix-first matching.
    #[must_use]
    pub fn find_by_key(&self, key: &str) -> Option<Arc<IndexSchema>> {
        self.schemas
            .read()
            .iter()
            .find(|s| key.starts_with(s.prefix()))
            .cloned()
    }

    /// Registered index names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.schemas.read().iter().map(|s| s.name().to_string()).collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }

    pub fn clear(&self) {
        self.schemas.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(name: &str, prefix: &str) -> IndexSchema {
        IndexSchema::builder(name).prefix(prefix).tag("t").build().unwrap()
    }

    #[test]
    fn test_empty_registry() {
        let registry = SchemaRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("users").is_none());
        assert!(registry.find_by_key("user:1").is_none());
    }

    #[test]
    fn test_lookup_by_name_and_key() {
        let registry = SchemaRegistry::new();
        registry.register(schema("users", "user"));
        registry.register(schema("posts", "post"));

        assert_eq!(registry.get("users").unwrap().prefix(), "user");
        assert_eq!(registry.find_by_key("post:xyz").unwrap().name(), "posts");
        assert!(registry.find_by_key("comment:1").is_none());
    }

    #[test]
    fn test_longest_prefix_wins() {
        let registry = SchemaRegistry::new();
        registry.register(schema("all_users", "user"));
        registry.register(schema("admins", "user:admin"));

        assert_eq!(registry.find_by_key("user:admin:1").unwrap().name(), "admins");
        assert_eq!(registry.find_by_key("user:bob").unwrap().name(), "all_users");
    }

    #[test]
    fn test_order_independence() {
        let registry = SchemaRegistry::new();
        registry.register(schema("admins", "user:admin"));
        registry.register(schema("all_users", "user"));

        assert_eq!(registry.find_by_key("user:admin:1").unwrap().name(), "admins");
    }

    #[test]
    fn test_replace_and_unregister() {
        let registry = SchemaRegistry::new();
        registry.register(schema("users", "user"));
        registry.register(schema("users", "member"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("users").unwrap().prefix(), "member");

        assert!(registry.unregister("users"));
        assert!(!registry.unregister("users"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_names_and_clear() {
        let registry = SchemaRegistry::new();
        registry.register(schema("b", "b"));
        registry.register(schema("a", "a"));
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);

        registry.clear();
        assert_eq!(registry.len(), 0);
    }
}
