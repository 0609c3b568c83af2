use log::{info, warn};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{RegistrationOptions, ServiceWorkerRegistration};

use crate::config;

/// Registers the offline worker in the background. Browsers without service
/// worker support just keep going online-only.
pub fn register_service_worker() {
    if !config::service_worker_enabled() {
        info!("service worker disabled in this build");
        return;
    }
    spawn_local(async {
        match register(config::SERVICE_WORKER_URL, config::SERVICE_WORKER_SCOPE).await {
            Ok(registration) => info!("service worker registered for scope {}", registration.scope()),
            Err(err) => warn!("service worker registration failed: {:?}", err),
        }
    });
}

async fn register(url: &str, scope: &str) -> Result<ServiceWorkerRegistration, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let navigator = window.navigator();
    if !js_sys::Reflect::has(&navigator, &JsValue::from_str("serviceWorker"))? {
        return Err(JsValue::from_str("service workers are not supported"));
    }
    let options = RegistrationOptions::new();
    options.set_scope(scope);
    let promise = navigator.service_worker().register_with_options(url, &options);
    let registration = JsFuture::from(promise).await?;
    Ok(registration.unchecked_into())
}
