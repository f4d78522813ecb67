//! JSON bridging between `JsValue` and `serde_json::Value`.

use js_sys::JSON;
use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;

/// Convert a JS value through `JSON.stringify`. `undefined` becomes `null`.
pub fn to_json(value: &JsValue) -> Result<Value, JsValue> {
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    let text: JsValue = JSON::stringify(value)?.into();
    match text.as_string() {
        Some(text) => serde_json::from_str(&text).map_err(|e| JsValue::from_str(&e.to_string())),
        None => Ok(Value::Null),
    }
}

/// Convert a JS object into a JSON map; anything that is not an object
/// yields an empty map.
pub fn to_map(value: &JsValue) -> Result<Map<String, Value>, JsValue> {
    match to_json(value)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

pub fn from_json(value: &Value) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    JSON::parse(&text)
}

pub fn keys_array(keys: &[&str]) -> js_sys::Array {
    keys.iter().map(|key| JsValue::from_str(key)).collect()
}

/// Best-effort text for a rejected promise.
pub fn error_text(error: &JsValue) -> String {
    if let Some(text) = error.as_string() {
        return text;
    }
    js_sys::Reflect::get(error, &"message".into())
        .ok()
        .and_then(|message| message.as_string())
        .unwrap_or_else(|| format!("{error:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn test_round_trip_object() {
        let value = serde_json::json!({ "sites": [{ "domain": "a.com" }], "globalEnabled": true });
        let js = from_json(&value).unwrap();
        assert_eq!(to_json(&js).unwrap(), value);
        assert!(to_map(&JsValue::from(3)).unwrap().is_empty());
        assert_eq!(to_json(&JsValue::UNDEFINED).unwrap(), Value::Null);
    }
}
