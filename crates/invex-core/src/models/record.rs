//! Records recovered from model output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key the source identifier is attached under.
pub const ID_KEY: &str = "id";

/// One parsed invoice as a raw key/value mapping.
///
/// Never null: a completion that cannot be parsed yields the empty mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedRecord(Map<String, Value>);

impl ExtractedRecord {
    /// The empty record substituted for unparsable output.
    pub fn empty() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Attach the source identifier, replacing any `id` the model emitted.
    pub fn set_id(&mut self, id: &str) {
        self.0.insert(ID_KEY.to_string(), Value::String(id.to_string()));
    }

    /// The linked source identifier, if set.
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_KEY).and_then(Value::as_str)
    }

    /// Look up a nested value by a dotted path such as `amount.total`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.0.get(first)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }
}

impl From<Map<String, Value>> for ExtractedRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// How a record was obtained from its completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    /// The located substring parsed as a JSON object.
    Parsed,
    /// Parsing failed and the empty record was substituted.
    Fallback { reason: String },
}

impl RecordOutcome {
    pub fn is_parsed(&self) -> bool {
        matches!(self, RecordOutcome::Parsed)
    }

    /// Short label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            RecordOutcome::Parsed => "parsed",
            RecordOutcome::Fallback { .. } => "fallback",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_id_overwrites() {
        let mut record: ExtractedRecord = json!({"id": "model-made-this-up", "total": 1})
            .as_object()
            .cloned()
            .unwrap()
            .into();
        record.set_id("images/a.png");
        assert_eq!(record.id(), Some("images/a.png"));
        assert_eq!(record.as_map().len(), 2);
    }

    #[test]
    fn test_lookup() {
        let record: ExtractedRecord = json!({"amount": {"total": 12.5, "currency": "USD"}})
            .as_object()
            .cloned()
            .unwrap()
            .into();
        assert_eq!(record.lookup("amount.total"), Some(&json!(12.5)));
        assert_eq!(record.lookup("amount.vat"), None);
        assert_eq!(record.lookup("missing"), None);
    }

    #[test]
    fn test_serializes_transparently() {
        let mut record = ExtractedRecord::empty();
        record.set_id("img1");
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"id":"img1"}"#);
    }
}
