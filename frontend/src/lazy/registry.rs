use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use futures::task::{LocalSpawn, LocalSpawnExt};
use log::{debug, info, warn};

use super::resource::{LoadError, Resource, ResourceStatus};
use crate::subscription::Subscription;

/// Outcome of a load, shared by every caller that asked while it was pending.
pub type LoadFuture<M> = Shared<LocalBoxFuture<'static, Result<M, LoadError>>>;

/// Where modules actually come from: script tags in the browser, a fake in tests.
pub trait Importer {
    type Module: Clone + 'static;

    fn import(&self, resource: Resource) -> LocalBoxFuture<'static, Result<Self::Module, LoadError>>;

    /// Registers `plugin` against its already loaded `parent`.
    fn register_plugin(
        &self,
        plugin: Resource,
        parent: &Self::Module,
        module: &Self::Module,
    ) -> Result<(), LoadError>;
}

struct Slot<M> {
    status: ResourceStatus<M>,
    pending: Option<LoadFuture<M>>,
    registered: bool,
}

impl<M> Default for Slot<M> {
    fn default() -> Self {
        Self {
            status: ResourceStatus::Unrequested,
            pending: None,
            registered: false,
        }
    }
}

type Listener<M> = Rc<dyn Fn(Resource, &ResourceStatus<M>)>;

struct Inner<I: Importer> {
    importer: I,
    spawner: Box<dyn LocalSpawn>,
    slots: RefCell<HashMap<Resource, Slot<I::Module>>>,
    listeners: RefCell<Vec<(u64, Listener<I::Module>)>>,
    next_listener: Cell<u64>,
}

/// Process-wide record of which libraries are loading or loaded.
///
/// Create one per app and hand clones to whoever needs it; every clone sees
/// the same state. Each resource is imported at most once at a time, and
/// once `Ready` it is never imported again.
pub struct ResourceRegistry<I: Importer> {
    inner: Rc<Inner<I>>,
}

impl<I: Importer> Clone for ResourceRegistry<I> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<I: Importer> PartialEq for ResourceRegistry<I> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<I: Importer + 'static> ResourceRegistry<I> {
    /// `spawner` drives started loads to completion even when nobody awaits them.
    pub fn new(importer: I, spawner: impl LocalSpawn + 'static) -> Self {
        Self {
            inner: Rc::new(Inner {
                importer,
                spawner: Box::new(spawner),
                slots: RefCell::new(HashMap::new()),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
            }),
        }
    }

    pub fn status(&self, resource: Resource) -> ResourceStatus<I::Module> {
        self.inner
            .slots
            .borrow()
            .get(&resource)
            .map(|slot| slot.status.clone())
            .unwrap_or(ResourceStatus::Unrequested)
    }

    pub fn value(&self, resource: Resource) -> Option<I::Module> {
        self.status(resource).value().cloned()
    }

    /// Starts loading `resource` unless it is already loading or loaded.
    ///
    /// A `Failed` resource is retried. Errors never escape synchronously:
    /// they resolve the returned future and are recorded as `Failed`.
    pub fn ensure_loaded(&self, resource: Resource) -> LoadFuture<I::Module> {
        let load = {
            let mut slots = self.inner.slots.borrow_mut();
            let slot = slots.entry(resource).or_default();
            match &slot.status {
                ResourceStatus::Ready(module) => {
                    return future::ready(Ok(module.clone())).boxed_local().shared();
                }
                ResourceStatus::Loading => {
                    if let Some(pending) = slot.pending.clone() {
                        return pending;
                    }
                }
                ResourceStatus::Unrequested | ResourceStatus::Failed(_) => {}
            }

            let load = self.load(resource).boxed_local().shared();
            slot.status = ResourceStatus::Loading;
            slot.pending = Some(load.clone());
            load
        };

        debug!("loading {}", resource);
        self.notify(resource, &ResourceStatus::Loading);
        if let Err(err) = self.inner.spawner.spawn_local(load.clone().map(|_| ())) {
            warn!("could not schedule load of {}: {}", resource, err);
        }
        load
    }

    /// Same as [`ensure_loaded`](Self::ensure_loaded) for a name coming from
    /// configuration; unknown names fail without touching any state.
    #[cfg(test)]
    pub fn ensure_loaded_by_name(&self, name: &str) -> LoadFuture<I::Module> {
        match name.parse::<Resource>() {
            Ok(resource) => self.ensure_loaded(resource),
            Err(err) => {
                warn!("{}", err);
                future::ready(Err(err)).boxed_local().shared()
            }
        }
    }

    /// Calls `listener` on every status transition of any resource.
    pub fn subscribe(&self, listener: impl Fn(Resource, &ResourceStatus<I::Module>) + 'static) -> Subscription {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);
        self.inner.listeners.borrow_mut().push((id, Rc::new(listener)));

        let inner = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.listeners.borrow_mut().retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }

    fn load(&self, resource: Resource) -> impl std::future::Future<Output = Result<I::Module, LoadError>> + 'static {
        let registry = self.clone();
        async move {
            let result = registry.import_with_parent(resource).await;
            registry.settle(resource, &result);
            result
        }
    }

    async fn import_with_parent(&self, resource: Resource) -> Result<I::Module, LoadError> {
        let parent = match resource.parent() {
            Some(parent) => {
                let module = self.ensure_loaded(parent).await.map_err(|err| LoadError::Parent {
                    resource,
                    parent,
                    reason: err.to_string(),
                })?;
                Some((parent, module))
            }
            None => None,
        };

        let module = self.inner.importer.import(resource).await?;
        if let Some((parent, parent_module)) = parent {
            self.register_once(resource, parent, &parent_module, &module)?;
        }
        Ok(module)
    }

    fn register_once(
        &self,
        resource: Resource,
        parent: Resource,
        parent_module: &I::Module,
        module: &I::Module,
    ) -> Result<(), LoadError> {
        let already = {
            let mut slots = self.inner.slots.borrow_mut();
            std::mem::replace(&mut slots.entry(resource).or_default().registered, true)
        };
        if already {
            return Ok(());
        }

        if let Err(err) = self.inner.importer.register_plugin(resource, parent_module, module) {
            self.inner.slots.borrow_mut().entry(resource).or_default().registered = false;
            return Err(err);
        }
        debug!("registered {} with {}", resource, parent);
        Ok(())
    }

    fn settle(&self, resource: Resource, result: &Result<I::Module, LoadError>) {
        let status = match result {
            Ok(module) => {
                info!("{} ready", resource);
                ResourceStatus::Ready(module.clone())
            }
            Err(err) => {
                warn!("{}", err);
                ResourceStatus::Failed(err.clone())
            }
        };
        {
            let mut slots = self.inner.slots.borrow_mut();
            let slot = slots.entry(resource).or_default();
            slot.status = status.clone();
            slot.pending = None;
        }
        self.notify(resource, &status);
    }

    fn notify(&self, resource: Resource, status: &ResourceStatus<I::Module>) {
        let listeners: Vec<_> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(resource, status);
        }
    }
}
