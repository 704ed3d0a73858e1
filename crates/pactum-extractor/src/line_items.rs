//! Aggregation of per-chunk line item lists

use pactum_domain::{Completeness, LineItem};
use std::collections::HashMap;
use tracing::debug;

/// Concatenates and deduplicates line items without consulting the service
pub struct LineItemAggregator;

impl LineItemAggregator {
    /// Merge lists given in chunk order into one deduplicated list
    ///
    /// Items are keyed by trimmed, case-insensitive name. On collision the
    /// strictly more complete item wins and keeps the earlier position.
    /// Items with an empty name are dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use pactum_domain::LineItem;
    /// use pactum_extractor::LineItemAggregator;
    ///
    /// let mut priced = LineItem::named("cartridge refill ");
    /// priced.unit_price = Some(539.5);
    ///
    /// let items = LineItemAggregator::aggregate(vec![
    ///     vec![LineItem::named("Cartridge refill"), LineItem::named("Printer repair")],
    ///     vec![priced],
    /// ]);
    /// assert_eq!(items.len(), 2);
    /// assert_eq!(items[0].unit_price, Some(539.5));
    /// ```
    pub fn aggregate<I>(lists: I) -> Vec<LineItem>
    where
        I: IntoIterator<Item = Vec<LineItem>>,
    {
        let mut items: Vec<LineItem> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut duplicates = 0usize;

        for item in lists.into_iter().flatten() {
            let key = item.dedup_key();
            if key.is_empty() {
                continue;
            }
            match positions.get(&key) {
                Some(&pos) => {
                    duplicates += 1;
                    if item.filled_fields() > items[pos].filled_fields() {
                        items[pos] = item;
                    }
                }
                None => {
                    positions.insert(key, items.len());
                    items.push(item);
                }
            }
        }

        debug!(
            "Aggregated {} line items ({} duplicates merged)",
            items.len(),
            duplicates
        );
        items
    }
}
