//! Inventory snapshot store.
//!
//! Caches the last-fetched stock list and derives the dashboard aggregates.
//! The cache is only ever replaced wholesale: a failed or partial remote
//! read leaves the previous snapshot untouched. All aggregates are pure
//! reads recomputed per call — the snapshot is small (tens to low hundreds
//! of rows) so there is nothing worth maintaining incrementally.

use serde::{Deserialize, Serialize};

/// One stock line as tracked by the ward sheet.
///
/// `current_stock` is the only quantity mutated during normal operation;
/// `name`/`unit`/`min`/`max` change only through an explicit item update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub current_stock: i64,
    pub min: i64,
    pub max: i64,
    #[serde(default)]
    pub category: String,
}

impl InventoryItem {
    /// At or below the configured minimum (boundary `stock == min` counts).
    pub fn is_critical(&self) -> bool {
        self.current_stock <= self.min
    }

    pub fn is_out(&self) -> bool {
        self.current_stock == 0
    }
}

/// Stock-status counts for the dashboard donut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockStats {
    pub total: usize,
    pub low: usize,
    pub out: usize,
    pub normal: usize,
}

/// Wholesale-replaced cache of the current stock levels.
#[derive(Debug, Default, Clone)]
pub struct InventorySnapshot {
    items: Vec<InventoryItem>,
}

impl InventorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[InventoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replace the entire cached list. There is no incremental merge.
    pub fn replace_all(&mut self, items: Vec<InventoryItem>) {
        self.items = items;
    }

    /// Case-insensitive, whitespace-trimmed exact match on the item id.
    /// No fuzzy or partial matching.
    pub fn lookup(&self, raw_id: &str) -> Option<&InventoryItem> {
        let wanted = raw_id.trim();
        if wanted.is_empty() {
            return None;
        }
        self.items
            .iter()
            .find(|item| item.id.trim().eq_ignore_ascii_case(wanted))
    }

    /// Exact name match, used by the deep-link query parameter.
    pub fn find_by_name(&self, name: &str) -> Option<&InventoryItem> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Substring filter over name and id for the dashboard search box.
    pub fn search(&self, term: &str) -> Vec<&InventoryItem> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return self.items.iter().collect();
        }
        self.items
            .iter()
            .filter(|item| {
                item.name.to_lowercase().contains(&term) || item.id.to_lowercase().contains(&term)
            })
            .collect()
    }

    /// Dashboard counts. `total == low + out + normal` always holds.
    pub fn stats(&self) -> StockStats {
        let total = self.items.len();
        let low = self
            .items
            .iter()
            .filter(|i| i.current_stock > 0 && i.current_stock <= i.min)
            .count();
        let out = self.items.iter().filter(|i| i.is_out()).count();
        StockStats {
            total,
            low,
            out,
            normal: total - low - out,
        }
    }

    /// Items at or below their minimum, out-of-stock rows first, then
    /// ascending by remaining stock. Ties keep their snapshot order.
    pub fn critical_items(&self) -> Vec<&InventoryItem> {
        let mut critical: Vec<&InventoryItem> =
            self.items.iter().filter(|i| i.is_critical()).collect();
        critical.sort_by_key(|i| (!i.is_out(), i.current_stock));
        critical
    }

    /// Top-`n` most critical rows for the stock-level bar chart.
    pub fn low_stock_bars(&self, n: usize) -> Vec<&InventoryItem> {
        let mut rows = self.critical_items();
        rows.truncate(n);
        rows
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, stock: i64, min: i64) -> InventoryItem {
        InventoryItem {
            id: id.to_string(),
            name: format!("item {id}"),
            unit: "ชิ้น".to_string(),
            current_stock: stock,
            min,
            max: 100,
            category: "General".to_string(),
        }
    }

    fn snapshot(items: Vec<InventoryItem>) -> InventorySnapshot {
        let mut snap = InventorySnapshot::new();
        snap.replace_all(items);
        snap
    }

    #[test]
    fn test_lookup_is_case_and_whitespace_insensitive() {
        let snap = snapshot(vec![item("A1", 5, 2)]);
        assert_eq!(snap.lookup("a1 ").unwrap().id, "A1");
        assert_eq!(snap.lookup(" A1").unwrap().id, "A1");
        assert!(snap.lookup("A2").is_none());
        assert!(snap.lookup("   ").is_none());
        // no partial matching
        assert!(snap.lookup("A").is_none());
    }

    #[test]
    fn test_stats_invariant() {
        let snap = snapshot(vec![
            item("A", 0, 5),
            item("B", 3, 5),
            item("C", 10, 5),
            item("D", 5, 5),
        ]);
        let s = snap.stats();
        assert_eq!(s.total, 4);
        assert_eq!(s.out, 1);
        assert_eq!(s.low, 2); // B (3<=5) and D (5<=5); A is out, not low
        assert_eq!(s.total, s.low + s.out + s.normal);
    }

    #[test]
    fn test_critical_ordering() {
        // (stock, min) pairs from the dashboard contract: out-of-stock rows
        // first (stable for ties), then ascending stock; stock == min is
        // included, stock > min is not.
        let snap = snapshot(vec![
            item("P", 0, 5),
            item("Q", 3, 5),
            item("R", 5, 5),
            item("S", 0, 2),
            item("T", 6, 5),
        ]);
        let critical: Vec<&str> = snap
            .critical_items()
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(critical, vec!["P", "S", "Q", "R"]);
    }

    #[test]
    fn test_search_matches_name_and_id() {
        let mut a = item("GZ-01", 5, 2);
        a.name = "ผ้าก๊อซ".to_string();
        let snap = snapshot(vec![a, item("A1", 1, 2)]);
        assert_eq!(snap.search("gz").len(), 1);
        assert_eq!(snap.search("ผ้า").len(), 1);
        assert_eq!(snap.search("").len(), 2);
        assert!(snap.search("xyz").is_empty());
    }

    #[test]
    fn test_replace_all_is_wholesale() {
        let mut snap = snapshot(vec![item("A1", 5, 2), item("B2", 1, 2)]);
        snap.replace_all(vec![item("C3", 7, 2)]);
        assert_eq!(snap.len(), 1);
        assert!(snap.lookup("A1").is_none());
        assert!(snap.lookup("c3").is_some());
    }

    #[test]
    fn test_low_stock_bars_truncates() {
        let snap = snapshot(vec![item("A", 0, 5), item("B", 1, 5), item("C", 2, 5)]);
        assert_eq!(snap.low_stock_bars(2).len(), 2);
        assert_eq!(snap.low_stock_bars(2)[0].id, "A");
    }
}
