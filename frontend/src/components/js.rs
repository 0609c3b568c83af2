//! Thin reflection helpers for driving the UMD libraries from Rust.

use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::{JsCast, JsValue};

pub fn get(target: &JsValue, key: &str) -> Result<JsValue, JsValue> {
    Reflect::get(target, &JsValue::from_str(key))
}

pub fn set(target: &JsValue, key: &str, value: impl Into<JsValue>) -> Result<(), JsValue> {
    Reflect::set(target, &JsValue::from_str(key), &value.into()).map(|_| ())
}

/// `target[method](...args)`
pub fn call(target: &JsValue, method: &str, args: &[JsValue]) -> Result<JsValue, JsValue> {
    let function: Function = get(target, method)?.dyn_into()?;
    Reflect::apply(&function, target, &args.iter().collect::<Array>())
}

/// `new module[class](...args)`
pub fn construct(module: &JsValue, class: &str, args: &[JsValue]) -> Result<JsValue, JsValue> {
    let constructor: Function = get(module, class)?.dyn_into()?;
    Reflect::construct(&constructor, &args.iter().collect::<Array>())
}

/// Plain object from key/value pairs.
pub fn object(fields: &[(&str, JsValue)]) -> Result<JsValue, JsValue> {
    let object = Object::new();
    for (key, value) in fields {
        Reflect::set(&object, &JsValue::from_str(key), value)?;
    }
    Ok(object.into())
}
