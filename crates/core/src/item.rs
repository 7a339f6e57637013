//! Sequenced item domain types.
//!
//! These are the value objects that flow through the resequencer:
//! Producer submits an item → Engine buffers it → a contiguous run is released
//! → Dispatcher hands the run to its destination.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Identifier grouping items that belong to one logical sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(pub String);

impl CorrelationKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CorrelationKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical destination a released run is delivered to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Destination(pub String);

impl Destination {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Destination {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single item of a sequence.
///
/// Positions are 0-based and `total` is the number of items in the sequence,
/// so valid positions are `0..total` and the terminal position is `total - 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedItem {
    /// The sequence this item belongs to
    pub correlation_key: CorrelationKey,

    /// Index of this item within its sequence
    pub position: u64,

    /// Declared number of items in the sequence
    pub total: u64,

    /// Where the producer asked released items to go (if anywhere)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Destination>,

    /// Opaque payload, never inspected by the engine
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl SequencedItem {
    /// Create an item with an empty payload.
    pub fn new(correlation_key: impl Into<CorrelationKey>, position: u64, total: u64) -> Self {
        Self {
            correlation_key: correlation_key.into(),
            position,
            total,
            reply_to: None,
            payload: serde_json::Value::Null,
        }
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Attach a reply-to destination.
    pub fn with_reply_to(mut self, destination: impl Into<Destination>) -> Self {
        self.reply_to = Some(destination.into());
        self
    }

    /// Parse one item from a JSON line.
    pub fn from_json_line(line: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Whether this item sits at the end of its declared sequence.
    pub fn is_terminal(&self) -> bool {
        self.total > 0 && self.position == self.total - 1
    }
}

/// An ordered, immutable run of items released for one correlation key.
///
/// Cloning is cheap: the items are shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleasedRun {
    /// Unique ID for this run (for tracing across the handoff)
    pub run_id: Uuid,

    /// The sequence the run belongs to
    pub correlation_key: CorrelationKey,

    /// Where the run is delivered
    pub destination: Destination,

    /// Items in strictly ascending position order
    pub items: Arc<[SequencedItem]>,
}

impl ReleasedRun {
    pub fn new(
        correlation_key: CorrelationKey,
        destination: Destination,
        items: Vec<SequencedItem>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            correlation_key,
            destination,
            items: items.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&SequencedItem> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&SequencedItem> {
        self.items.last()
    }

    /// Positions of the released items, in order.
    pub fn positions(&self) -> Vec<u64> {
        self.items.iter().map(|item| item.position).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_position_is_total_minus_one() {
        assert!(SequencedItem::new("a", 3, 4).is_terminal());
        assert!(!SequencedItem::new("a", 2, 4).is_terminal());
        assert!(!SequencedItem::new("a", 0, 0).is_terminal());
    }

    #[test]
    fn item_parses_from_json_line() {
        let line = r#"{"correlation_key":"order-7","position":2,"total":5,"reply_to":"billing","payload":{"sku":"X1"}}"#;
        let item: SequencedItem = serde_json::from_str(line).unwrap();
        assert_eq!(item.correlation_key, CorrelationKey::from("order-7"));
        assert_eq!(item.position, 2);
        assert_eq!(item.reply_to, Some(Destination::from("billing")));
        assert_eq!(item.payload["sku"], "X1");
    }

    #[test]
    fn malformed_line_is_an_error() {
        let err = SequencedItem::from_json_line(r#"{"correlation_key":"k"}"#).unwrap_err();
        assert!(err.to_string().contains("position"));
    }

    #[test]
    fn payload_and_reply_to_are_optional() {
        let item: SequencedItem =
            serde_json::from_str(r#"{"correlation_key":"k","position":0,"total":1}"#).unwrap();
        assert!(item.reply_to.is_none());
        assert!(item.payload.is_null());

        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("reply_to"));
    }

    #[test]
    fn released_run_shares_items_on_clone() {
        let run = ReleasedRun::new(
            "k".into(),
            "out".into(),
            vec![SequencedItem::new("k", 0, 2), SequencedItem::new("k", 1, 2)],
        );
        let copy = run.clone();
        assert!(Arc::ptr_eq(&run.items, &copy.items));
        assert_eq!(copy.positions(), vec![0, 1]);
        assert_eq!(run.last().map(|i| i.position), Some(1));
    }
}
