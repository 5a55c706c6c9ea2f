// src/ingest/registry.rs
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::info;

use super::types::{Category, Collector, CollectorMeta};

#[derive(Clone)]
pub struct RegisteredCollector {
    pub meta: CollectorMeta,
    pub collector: Arc<dyn Collector>,
}

/// Collectors keyed by their metadata id, in registration order.
#[derive(Clone, Default)]
pub struct CollectorRegistry {
    entries: Vec<RegisteredCollector>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: Collector + 'static>(&mut self, meta: CollectorMeta, collector: C) -> Result<()> {
        self.register_arc(meta, Arc::new(collector))
    }

    pub fn register_arc(&mut self, meta: CollectorMeta, collector: Arc<dyn Collector>) -> Result<()> {
        if self.entries.iter().any(|e| e.meta.id == meta.id) {
            bail!("collector id `{}` registered twice", meta.id);
        }
        self.entries.push(RegisteredCollector { meta, collector });
        Ok(())
    }

    /// Returns false if no collector has this id.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.entries.iter_mut().find(|e| e.meta.id == id) {
            Some(entry) => {
                entry.meta.enabled = enabled;
                info!(target: "ingest", collector = id, enabled, "collector toggled");
                true
            }
            None => false,
        }
    }

    /// All metadata, highest priority first.
    pub fn list(&self) -> Vec<CollectorMeta> {
        let mut v: Vec<CollectorMeta> = self.entries.iter().map(|e| e.meta.clone()).collect();
        v.sort_by(|a, b| b.priority.cmp(&a.priority));
        v
    }

    /// Enabled collectors, highest priority first (stable for equal priority).
    pub fn enabled(&self) -> Vec<RegisteredCollector> {
        self.select(|_| true)
    }

    pub fn enabled_in(&self, category: Category) -> Vec<RegisteredCollector> {
        self.select(|m| m.category == category)
    }

    fn select(&self, pred: impl Fn(&CollectorMeta) -> bool) -> Vec<RegisteredCollector> {
        let mut v: Vec<RegisteredCollector> = self
            .entries
            .iter()
            .filter(|e| e.meta.enabled && pred(&e.meta))
            .cloned()
            .collect();
        v.sort_by(|a, b| b.meta.priority.cmp(&a.meta.priority));
        v
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    struct Empty;

    #[async_trait::async_trait]
    impl Collector for Empty {
        async fn collect(&self) -> Result<Vec<Record>> {
            Ok(Vec::new())
        }
    }

    fn registry() -> CollectorRegistry {
        let mut r = CollectorRegistry::new();
        r.register(CollectorMeta::new("low", "Low", Category::Private).with_priority(3), Empty)
            .unwrap();
        r.register(CollectorMeta::new("gov", "Gov", Category::Government).with_priority(10), Empty)
            .unwrap();
        r.register(
            CollectorMeta::new("off", "Off", Category::Government).with_priority(9).disabled(),
            Empty,
        )
        .unwrap();
        r
    }

    #[test]
    fn enabled_sorted_by_priority() {
        let ids: Vec<_> = registry().enabled().into_iter().map(|e| e.meta.id).collect();
        assert_eq!(ids, vec!["gov", "low"]);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut r = registry();
        assert!(r.register(CollectorMeta::new("gov", "Again", Category::Local), Empty).is_err());
    }

    #[test]
    fn toggles_and_categories() {
        let mut r = registry();
        assert!(r.set_enabled("off", true));
        assert!(!r.set_enabled("nope", true));
        let gov: Vec<_> = r
            .enabled_in(Category::Government)
            .into_iter()
            .map(|e| e.meta.id)
            .collect();
        assert_eq!(gov, vec!["gov", "off"]);

        assert!(r.set_enabled("gov", false));
        assert_eq!(r.list().len(), 3);
        assert_eq!(r.enabled().len(), 2);
    }
}
