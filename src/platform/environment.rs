//! Runtime environment detection and default configuration lookup.

use std::env;
use std::fs;

use serde_json::{Map, Value};

/// Returns the parsed `__MATOMO_DEFAULTS__` object when available.
///
/// Sources are consulted in order: the `MATOMO_DEFAULTS` environment variable (inline JSON or
/// `key=value` pairs), the JSON file named by `MATOMO_DEFAULTS_PATH`, and finally the
/// `__MATOMO_DEFAULTS__` global when running in a browser.
pub fn matomo_defaults() -> Option<Map<String, Value>> {
    defaults_from_env()
        .or_else(defaults_from_path)
        .or_else(defaults_from_global)
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
}

fn defaults_from_env() -> Option<Value> {
    let raw = env::var("MATOMO_DEFAULTS").ok()?;
    parse_config_source(&raw)
}

fn defaults_from_path() -> Option<Value> {
    let path = env::var("MATOMO_DEFAULTS_PATH").ok()?;
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str::<Value>(&content).ok()
}

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
fn defaults_from_global() -> Option<Value> {
    use wasm_bindgen::JsValue;

    let global = js_sys::global();
    let value = js_sys::Reflect::get(&global, &JsValue::from_str("__MATOMO_DEFAULTS__")).ok()?;
    if value.is_null() || value.is_undefined() {
        return None;
    }
    let serialized = js_sys::JSON::stringify(&value).ok()?.as_string()?;
    serde_json::from_str(&serialized).ok()
}

#[cfg(not(all(target_arch = "wasm32", feature = "wasm-web")))]
fn defaults_from_global() -> Option<Value> {
    None
}

fn parse_config_source(raw: &str) -> Option<Value> {
    if let Ok(json) = serde_json::from_str::<Value>(raw) {
        if json.is_object() {
            return Some(json);
        }
    }
    parse_key_value_config(raw)
}

fn parse_key_value_config(raw: &str) -> Option<Value> {
    let mut map = Map::new();
    for entry in raw.split(',') {
        let mut parts = entry.splitn(2, '=');
        let key = parts.next()?.trim();
        let value = parts.next()?.trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map))
    }
}

/// Returns `true` if the runtime exposes a browser `window`.
pub fn is_browser() -> bool {
    #[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
    {
        web_sys::window().is_some()
    }

    #[cfg(not(all(target_arch = "wasm32", feature = "wasm-web")))]
    {
        false
    }
}
