//! Typed rows of the transaction dataset and the joins that turn them into
//! [`TransactionRecord`]s for the sequence builder.

use crate::{EntityKey, Error, Result};
use ahash::AHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// One row of input to the sequence builder.
///
/// `group_key` and `entity_id` may be absent when the row came out of a join
/// that did not match; [`crate::build_corpus`] refuses such rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub group_key: Option<EntityKey>,
    pub entity_id: Option<EntityKey>,
    pub position: u32,
    #[serde(default)]
    pub secondary_sort_key: Option<u32>,
}

impl TransactionRecord {
    #[inline]
    #[must_use]
    pub fn new(group_key: impl Into<EntityKey>, entity_id: impl Into<EntityKey>, position: u32) -> Self {
        Self {
            group_key: Some(group_key.into()),
            entity_id: Some(entity_id.into()),
            position,
            secondary_sort_key: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_secondary(mut self, key: u32) -> Self {
        self.secondary_sort_key = Some(key);
        self
    }
}

/// Which split of the dataset an order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalSet {
    Prior,
    Train,
    Test,
}

/// A product placed in an order. Prior and train splits share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: u64,
    pub product_id: u64,
    pub add_to_cart_order: u32,
    #[serde(default)]
    pub reordered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: u64,
    pub user_id: u64,
    pub eval_set: EvalSet,
    pub order_number: u32,
    #[serde(default)]
    pub order_dow: u8,
    #[serde(default)]
    pub order_hour_of_day: u8,
    #[serde(default)]
    pub days_since_prior_order: Option<f32>,
}

/// One record per order line: group = order, entity = product, position =
/// add-to-cart order.
pub fn product_records(lines: &[OrderLine]) -> Vec<TransactionRecord> {
    lines
        .iter()
        .map(|line| TransactionRecord::new(line.order_id, line.product_id, line.add_to_cart_order))
        .collect()
}

/// One record per order line grouped by the customer who placed the order.
///
/// Orders sort by `order_number`, items by add-to-cart order. A line whose
/// order is missing from `orders` keeps an absent group key, so the corpus
/// build fails instead of silently losing the line.
pub fn customer_records(lines: &[OrderLine], orders: &[Order]) -> Vec<TransactionRecord> {
    let by_id: AHashMap<u64, (u64, u32)> = orders
        .iter()
        .map(|o| (o.order_id, (o.user_id, o.order_number)))
        .collect();

    lines
        .iter()
        .map(|line| match by_id.get(&line.order_id) {
            Some(&(user_id, order_number)) => {
                TransactionRecord::new(user_id, line.product_id, line.add_to_cart_order)
                    .with_secondary(order_number)
            }
            None => TransactionRecord {
                group_key: None,
                entity_id: Some(EntityKey::Integer(line.product_id)),
                position: line.add_to_cart_order,
                secondary_sort_key: None,
            },
        })
        .collect()
}

/// Read typed rows from a JSON Lines file. Blank lines are skipped.
pub fn load_jsonl<T, P>(path: P) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)?;
    let rows = read_jsonl(BufReader::new(file))?;
    info!("Loaded {} rows from {:?}", rows.len(), path);
    Ok(rows)
}

/// Parse JSON Lines from any reader. A malformed row fails the whole read
/// with `InvalidRecord` carrying its 1-based line number.
pub fn read_jsonl<T, R>(reader: R) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: BufRead,
{
    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line)
            .map_err(|e| Error::invalid_record(idx + 1, e.to_string()))?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn line(order_id: u64, product_id: u64, pos: u32) -> OrderLine {
        OrderLine {
            order_id,
            product_id,
            add_to_cart_order: pos,
            reordered: false,
        }
    }

    fn order(order_id: u64, user_id: u64, order_number: u32) -> Order {
        Order {
            order_id,
            user_id,
            eval_set: EvalSet::Prior,
            order_number,
            order_dow: 0,
            order_hour_of_day: 0,
            days_since_prior_order: None,
        }
    }

    #[test]
    fn test_product_records_group_by_order() {
        let records = product_records(&[line(7, 100, 2)]);
        assert_eq!(records[0].group_key, Some(EntityKey::Integer(7)));
        assert_eq!(records[0].entity_id, Some(EntityKey::Integer(100)));
        assert_eq!(records[0].position, 2);
        assert_eq!(records[0].secondary_sort_key, None);
    }

    #[test]
    fn test_customer_records_join_orders() {
        let orders = vec![order(1, 50, 3), order(2, 50, 1)];
        let records = customer_records(&[line(1, 10, 1), line(2, 20, 1)], &orders);
        assert_eq!(records[0].group_key, Some(EntityKey::Integer(50)));
        assert_eq!(records[0].secondary_sort_key, Some(3));
        assert_eq!(records[1].secondary_sort_key, Some(1));
    }

    #[test]
    fn test_customer_records_unmatched_order_has_no_group() {
        let records = customer_records(&[line(99, 10, 1)], &[order(1, 50, 1)]);
        assert!(records[0].group_key.is_none());
    }

    #[test]
    fn test_read_jsonl_skips_blank_lines() {
        let input = "{\"order_id\":1,\"product_id\":2,\"add_to_cart_order\":1}\n\n{\"order_id\":1,\"product_id\":3,\"add_to_cart_order\":2,\"reordered\":true}\n";
        let rows: Vec<OrderLine> = read_jsonl(Cursor::new(input)).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[1].reordered);
    }

    #[test]
    fn test_read_jsonl_reports_line_number() {
        let input = "{\"order_id\":1,\"product_id\":2,\"add_to_cart_order\":1}\n{\"order_id\":\"x\"}\n";
        let err = read_jsonl::<OrderLine, _>(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord { index: 2, .. }));
    }

    #[test]
    fn test_order_eval_set_lowercase() {
        let o: Order = serde_json::from_str(
            "{\"order_id\":1,\"user_id\":2,\"eval_set\":\"train\",\"order_number\":4}",
        )
        .unwrap();
        assert_eq!(o.eval_set, EvalSet::Train);
        assert!(o.days_since_prior_order.is_none());
    }
}
