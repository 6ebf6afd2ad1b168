//! Typed host values produced by script evaluation

use std::collections::BTreeMap;

/// The full set of host values a script may produce.
///
/// Anything outside this set (undefined, functions, symbols, BigInt,
/// promises, non-finite numbers) is rejected during conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<ScriptValue>),
    Map(BTreeMap<String, ScriptValue>),
    Null,
}

impl ScriptValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScriptValue::Null)
    }
}

impl From<ScriptValue> for serde_json::Value {
    fn from(value: ScriptValue) -> Self {
        match value {
            ScriptValue::Bool(flag) => serde_json::Value::Bool(flag),
            ScriptValue::Int(int) => serde_json::Value::from(int),
            ScriptValue::Float(number) => serde_json::Number::from_f64(number)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ScriptValue::Str(text) => serde_json::Value::String(text),
            ScriptValue::Seq(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            ScriptValue::Map(entries) => serde_json::Value::Object(
                entries
                    .into_iter()
                    .map(|(key, item)| (key, item.into()))
                    .collect(),
            ),
            ScriptValue::Null => serde_json::Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_to_json() {
        let value = ScriptValue::Map(BTreeMap::from([
            ("ok".to_owned(), ScriptValue::Bool(true)),
            (
                "values".to_owned(),
                ScriptValue::Seq(vec![
                    ScriptValue::Int(1),
                    ScriptValue::Float(0.5),
                    ScriptValue::Null,
                ]),
            ),
        ]));

        assert_eq!(
            serde_json::Value::from(value),
            json!({"ok": true, "values": [1, 0.5, null]})
        );
    }
}
