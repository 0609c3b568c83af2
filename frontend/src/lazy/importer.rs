use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture};
use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};
use log::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlScriptElement;

use super::registry::Importer;
use super::resource::{LoadError, Resource};

/// Runs registry loads on the browser's microtask queue.
pub struct WasmSpawner;

impl LocalSpawn for WasmSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}

/// Loads the UMD builds from the CDN with a `<script>` tag and hands back the
/// global each one installs.
pub struct ScriptImporter;

impl Importer for ScriptImporter {
    type Module = JsValue;

    fn import(&self, resource: Resource) -> LocalBoxFuture<'static, Result<JsValue, LoadError>> {
        async move {
            // already on the page, e.g. from a server-rendered tag
            if let Some(existing) = lookup_global(resource) {
                return Ok(existing);
            }
            inject_script(resource).await?;
            lookup_global(resource).ok_or(LoadError::MissingExport {
                resource,
                global: resource.global(),
            })
        }
        .boxed_local()
    }

    fn register_plugin(&self, plugin: Resource, parent: &JsValue, module: &JsValue) -> Result<(), LoadError> {
        let registration_error = |reason: String| LoadError::Registration {
            resource: plugin,
            parent: plugin.parent().unwrap_or(plugin),
            reason,
        };
        let register = js_sys::Reflect::get(parent, &JsValue::from_str("registerPlugin"))
            .map_err(|err| registration_error(format!("{:?}", err)))?
            .dyn_into::<js_sys::Function>()
            .map_err(|_| registration_error("registerPlugin is not a function".to_string()))?;
        register
            .call1(parent, module)
            .map_err(|err| registration_error(format!("{:?}", err)))?;
        Ok(())
    }
}

fn lookup_global(resource: Resource) -> Option<JsValue> {
    let window = web_sys::window()?;
    let value = js_sys::Reflect::get(&window, &JsValue::from_str(resource.global())).ok()?;
    if value.is_undefined() || value.is_null() {
        None
    } else {
        Some(value)
    }
}

async fn inject_script(resource: Resource) -> Result<(), LoadError> {
    let import_error = |reason: String| LoadError::Import { resource, reason };

    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| import_error("no document".to_string()))?;
    let head = document.head().ok_or_else(|| import_error("no <head>".to_string()))?;
    let script = document
        .create_element("script")
        .map_err(|err| import_error(format!("{:?}", err)))?
        .dyn_into::<HtmlScriptElement>()
        .map_err(|_| import_error("created element is not a script".to_string()))?;
    script.set_src(resource.script_url());
    script.set_async(true);
    script.set_cross_origin(Some("anonymous"));

    let (tx, rx) = oneshot::channel::<Result<(), String>>();
    let tx = Rc::new(RefCell::new(Some(tx)));
    let onload = {
        let tx = Rc::clone(&tx);
        Closure::<dyn FnMut()>::new(move || {
            if let Some(tx) = tx.borrow_mut().take() {
                let _ = tx.send(Ok(()));
            }
        })
    };
    let onerror = {
        let tx = Rc::clone(&tx);
        let url = resource.script_url();
        Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| {
            if let Some(tx) = tx.borrow_mut().take() {
                let _ = tx.send(Err(format!("network error loading {}", url)));
            }
        })
    };
    script.set_onload(Some(onload.as_ref().unchecked_ref()));
    script.set_onerror(Some(onerror.as_ref().unchecked_ref()));

    debug!("injecting {}", resource.script_url());
    head.append_child(&script)
        .map_err(|err| import_error(format!("{:?}", err)))?;

    let outcome = rx
        .await
        .unwrap_or_else(|_| Err("script load abandoned".to_string()));

    script.set_onload(None);
    script.set_onerror(None);
    if outcome.is_err() {
        // a retry appends a fresh tag
        script.remove();
    }
    outcome.map_err(import_error)
}
