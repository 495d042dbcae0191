use serde_json::Value;

/// What a list needs from its rows: a stable identity and a way to fold an
/// updated snapshot into the held copy.
pub trait LiveRecord: Clone {
    /// Identity within one list. Rows without one can only be inserted,
    /// never matched by a later update.
    fn record_id(&self) -> Option<String>;

    /// Folds `incoming`'s fields into `self`, keeping fields the snapshot
    /// does not mention.
    fn merge_from(&mut self, incoming: &Self);
}

/// Wire documents as list screens actually receive them: JSON objects with
/// an `id` (or Mongo-style `_id`), string or integer. Merge is a shallow
/// object merge; non-objects are replaced wholesale.
impl LiveRecord for Value {
    fn record_id(&self) -> Option<String> {
        for key in ["id", "_id"] {
            match self.get(key) {
                Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
                Some(Value::Number(n)) => return Some(n.to_string()),
                _ => {}
            }
        }
        None
    }

    fn merge_from(&mut self, incoming: &Self) {
        match (self, incoming) {
            (Value::Object(current), Value::Object(update)) => {
                for (key, value) in update {
                    current.insert(key.clone(), value.clone());
                }
            }
            (current, update) => *current = update.clone(),
        }
    }
}
