//! Conversions between JSON values and script values.

use rhai::{Array, Dynamic, EvalAltResult, Map as ScriptMap, Position};
use serde_json::{Map, Number, Value};

/// Converts a JSON value into the equivalent script value.
pub(crate) fn json_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(flag) => Dynamic::from(*flag),
        Value::Number(number) => number.as_i64().map_or_else(
            || Dynamic::from(number.as_f64().unwrap_or_default()),
            Dynamic::from,
        ),
        Value::String(text) => Dynamic::from(text.clone()),
        Value::Array(items) => Dynamic::from_array(items.iter().map(json_to_dynamic).collect()),
        Value::Object(fields) => {
            let mut map = ScriptMap::new();
            for (key, field) in fields {
                map.insert(key.as_str().into(), json_to_dynamic(field));
            }
            Dynamic::from_map(map)
        }
    }
}

/// Converts a script value into JSON. Values with no JSON shape become strings.
pub(crate) fn dynamic_to_json(value: &Dynamic) -> Value {
    if value.is_unit() {
        return Value::Null;
    }
    if let Ok(flag) = value.as_bool() {
        return Value::Bool(flag);
    }
    if let Ok(int) = value.as_int() {
        return Value::from(int);
    }
    if let Ok(float) = value.as_float() {
        return Number::from_f64(float).map_or(Value::Null, Value::Number);
    }
    if value.is_string() {
        return Value::String(value.clone().into_string().unwrap_or_default());
    }
    if let Some(items) = value.clone().try_cast::<Array>() {
        return Value::Array(items.iter().map(dynamic_to_json).collect());
    }
    if let Some(map) = value.clone().try_cast::<ScriptMap>() {
        let mut object = Map::new();
        for (key, field) in &map {
            object.insert(key.to_string(), dynamic_to_json(field));
        }
        return Value::Object(object);
    }
    Value::String(value.to_string())
}

/// Builds a script-catchable runtime error carrying `message`.
pub(crate) fn script_error(message: impl Into<String>) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(message.into()),
        Position::NONE,
    ))
}

/// Human-readable text for a thrown value: strings as-is, maps by their
/// `message` field, anything else through `Display`.
pub(crate) fn describe_thrown(value: &Dynamic) -> String {
    if value.is_string() {
        return value.clone().into_string().unwrap_or_default();
    }
    if let Some(map) = value.clone().try_cast::<ScriptMap>()
        && let Some(message) = map.get("message")
    {
        return message.to_string();
    }
    value.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_round_trips_through_script_values() {
        let original = json!({
            "name": "a.zip",
            "size": 42,
            "ratio": 0.5,
            "tags": ["x", "y"],
            "nested": {"ok": true, "none": null}
        });
        let back = dynamic_to_json(&json_to_dynamic(&original));
        assert_eq!(back, original);
    }

    #[test]
    fn test_json_object_becomes_script_map() {
        let value = json_to_dynamic(&json!({"k": "v"}));
        assert!(value.is_map());
        let map = value.try_cast::<ScriptMap>().unwrap();
        assert_eq!(map.get("k").unwrap().clone().into_string().unwrap(), "v");
    }

    #[test]
    fn test_describe_thrown_prefers_message_field() {
        let mut map = ScriptMap::new();
        map.insert("message".into(), Dynamic::from("share expired".to_string()));
        map.insert("code".into(), Dynamic::from(404_i64));
        assert_eq!(describe_thrown(&Dynamic::from_map(map)), "share expired");
        assert_eq!(describe_thrown(&Dynamic::from("plain".to_string())), "plain");
        assert_eq!(describe_thrown(&Dynamic::from(7_i64)), "7");
    }

    #[test]
    fn test_script_error_is_runtime_variant() {
        let err = script_error("boom");
        assert!(matches!(*err, EvalAltResult::ErrorRuntime(..)));
    }
}
