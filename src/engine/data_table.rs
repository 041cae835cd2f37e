//! Ordered, seed-keyed storage for crawl results.
//!
//! One slot per seed URL, created empty at engine start and overwritten
//! wholesale on every completion: a re-crawl replaces the previous list,
//! never appends to it. Slot order is the declared seed order, which is
//! what gives exports their deterministic shape. Slots disappear only
//! through 404 pruning.

use tracing::warn;
use url::Url;

use crate::spider::Record;

struct Slot {
    url: Url,
    records: Option<Vec<Record>>,
}

/// Insertion-ordered mapping `URL -> ParseResult | ⊥`.
pub(crate) struct DataTable {
    slots: Vec<Slot>,
}

impl DataTable {
    /// Creates the table with an empty slot per seed. Duplicate URLs
    /// collapse to the first occurrence's position.
    pub(crate) fn new(seeds: &[Url]) -> Self {
        let mut slots: Vec<Slot> = Vec::with_capacity(seeds.len());
        for url in seeds {
            if slots.iter().any(|slot| &slot.url == url) {
                warn!(%url, "duplicate seed collapses into one result slot");
                continue;
            }
            slots.push(Slot {
                url: url.clone(),
                records: None,
            });
        }
        DataTable { slots }
    }

    /// Replaces the slot for `url`. Returns false when no slot exists,
    /// which the caller reports; the table never grows new keys.
    pub(crate) fn store(&mut self, url: &Url, records: Vec<Record>) -> bool {
        match self.slots.iter_mut().find(|slot| &slot.url == url) {
            Some(slot) => {
                slot.records = Some(records);
                true
            }
            None => false,
        }
    }

    /// Drops the slot for `url` after a 404. Returns whether a slot was
    /// removed.
    pub(crate) fn prune(&mut self, url: &Url) -> bool {
        let before = self.slots.len();
        self.slots.retain(|slot| &slot.url != url);
        self.slots.len() != before
    }

    /// Flattens every filled slot in seed order; the flag reports whether
    /// any slot was still empty.
    pub(crate) fn collect_rows(&self) -> (Vec<Record>, bool) {
        let mut rows = Vec::new();
        let mut partial = false;
        for slot in &self.slots {
            match &slot.records {
                Some(records) => rows.extend(records.iter().cloned()),
                None => partial = true,
            }
        }
        (rows, partial)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn seeds() -> Vec<Url> {
        vec![url("http://localhost/a"), url("http://localhost/b")]
    }

    #[test]
    fn slots_start_empty_and_export_is_partial() {
        let table = DataTable::new(&seeds());
        let (rows, partial) = table.collect_rows();
        assert!(rows.is_empty());
        assert!(partial);
    }

    #[test]
    fn store_replaces_rather_than_appends() {
        let seeds = seeds();
        let mut table = DataTable::new(&seeds);
        assert!(table.store(&seeds[0], vec![json!(1), json!(2)]));
        assert!(table.store(&seeds[0], vec![json!(3)]));
        assert!(table.store(&seeds[1], vec![json!(4)]));
        let (rows, partial) = table.collect_rows();
        assert_eq!(rows, vec![json!(3), json!(4)]);
        assert!(!partial);
    }

    #[test]
    fn rows_follow_seed_order_not_completion_order() {
        let seeds = seeds();
        let mut table = DataTable::new(&seeds);
        table.store(&seeds[1], vec![json!("b")]);
        table.store(&seeds[0], vec![json!("a")]);
        let (rows, _) = table.collect_rows();
        assert_eq!(rows, vec![json!("a"), json!("b")]);
    }

    #[test]
    fn unknown_urls_never_grow_the_table() {
        let mut table = DataTable::new(&seeds());
        assert!(!table.store(&url("http://localhost/other"), vec![json!(1)]));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn pruned_slots_leave_a_complete_table() {
        let seeds = seeds();
        let mut table = DataTable::new(&seeds);
        assert!(table.prune(&seeds[1]));
        table.store(&seeds[0], vec![json!("a")]);
        let (rows, partial) = table.collect_rows();
        assert_eq!(rows, vec![json!("a")]);
        assert!(!partial);
    }

    #[test]
    fn duplicate_seeds_share_one_slot() {
        let dupes = vec![url("http://localhost/a"), url("http://localhost/a")];
        let table = DataTable::new(&dupes);
        assert_eq!(table.len(), 1);
    }
}
