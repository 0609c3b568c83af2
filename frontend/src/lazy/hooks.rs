use wasm_bindgen::JsValue;
use yew::prelude::*;

use super::importer::{ScriptImporter, WasmSpawner};
use super::registry::ResourceRegistry;
use super::resource::{LoadError, Resource, ResourceStatus};

pub type WebRegistry = ResourceRegistry<ScriptImporter>;

/// Builds the single registry the app provides through a `ContextProvider`.
pub fn web_registry() -> WebRegistry {
    ResourceRegistry::new(ScriptImporter, WasmSpawner)
}

pub struct LazyResource {
    pub status: ResourceStatus<JsValue>,
    /// Starts the load again after a failure; a no-op otherwise.
    pub retry: Callback<()>,
}

/// Tracks `resource` in the app registry and starts loading it once `enabled`.
///
/// Typically `enabled` is "the element has been on screen", so nothing is
/// fetched for sections the visitor never scrolls to.
#[hook]
pub fn use_lazy_resource(resource: Resource, enabled: bool) -> LazyResource {
    let registry = use_context::<WebRegistry>();
    let status = {
        let registry = registry.clone();
        use_state(move || match registry {
            Some(registry) => registry.status(resource),
            None => ResourceStatus::Unrequested,
        })
    };

    {
        let status = status.clone();
        let registry = registry.clone();
        use_effect_with_deps(
            move |(resource, enabled)| {
                let resource = *resource;
                let subscription = match registry {
                    Some(registry) => {
                        let subscription = {
                            let status = status.clone();
                            registry.subscribe(move |changed, new_status| {
                                if changed == resource {
                                    status.set(new_status.clone());
                                }
                            })
                        };
                        let current = registry.status(resource);
                        let ready = current.is_ready();
                        status.set(current);
                        if *enabled && !ready {
                            // the registry's spawner drives the load, the future is not needed here
                            drop(registry.ensure_loaded(resource));
                        }
                        Some(subscription)
                    }
                    None => {
                        status.set(ResourceStatus::Failed(LoadError::Import {
                            resource,
                            reason: "no resource registry provided".to_string(),
                        }));
                        None
                    }
                };
                move || drop(subscription)
            },
            (resource, enabled),
        );
    }

    let retry = Callback::from(move |_| {
        if let Some(registry) = &registry {
            if matches!(registry.status(resource), ResourceStatus::Failed(_)) {
                drop(registry.ensure_loaded(resource));
            }
        }
    });

    LazyResource {
        status: (*status).clone(),
        retry,
    }
}
