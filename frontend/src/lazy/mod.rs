//! Deferred, at-most-once loading of the heavy animation and rendering
//! libraries.

mod hooks;
mod importer;
mod registry;
mod resource;

pub use hooks::{use_lazy_resource, web_registry, LazyResource, WebRegistry};
pub use importer::{ScriptImporter, WasmSpawner};
pub use registry::{Importer, LoadFuture, ResourceRegistry};
pub use resource::{LoadError, Resource, ResourceStatus};
