use std::rc::Rc;

use log::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit};
use yew::prelude::*;

use super::gate::{IntersectionBackend, Observation, RawEntry, ViewportGate};
use super::options::ObserveOptions;
use crate::subscription::Subscription;

/// `IntersectionObserver`-backed monitor, one observer per observed element.
pub struct DomIntersection;

impl IntersectionBackend for DomIntersection {
    type Target = Element;

    fn connect(
        &self,
        target: &Element,
        options: &ObserveOptions,
        on_entries: Box<dyn Fn(Vec<RawEntry>)>,
    ) -> Subscription {
        let init = IntersectionObserverInit::new();
        init.set_threshold(&JsValue::from_f64(options.threshold.value()));
        init.set_root_margin(&options.root_margin.to_string());

        let on_entries: Rc<dyn Fn(Vec<RawEntry>)> = Rc::from(on_entries);
        let forward = Rc::clone(&on_entries);
        let callback = Closure::<dyn FnMut(js_sys::Array, IntersectionObserver)>::new(
            move |entries: js_sys::Array, _observer: IntersectionObserver| {
                let entries = entries
                    .iter()
                    .filter_map(|entry| entry.dyn_into::<IntersectionObserverEntry>().ok())
                    .map(|entry| RawEntry {
                        is_intersecting: entry.is_intersecting(),
                        intersection_ratio: entry.intersection_ratio(),
                    })
                    .collect();
                forward(entries);
            },
        );

        let observer = match IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init) {
            Ok(observer) => observer,
            Err(err) => {
                // no observer support: treat the element as visible so gated content still shows
                warn!("IntersectionObserver unavailable: {:?}", err);
                on_entries(vec![RawEntry {
                    is_intersecting: true,
                    intersection_ratio: 1.0,
                }]);
                return Subscription::noop();
            }
        };
        observer.observe(target);

        Subscription::new(move || {
            observer.disconnect();
            // teardown can run from inside the callback itself, release it on a later tick
            wasm_bindgen_futures::spawn_local(async move {
                drop(callback);
            });
        })
    }
}

/// Observes `node` once it is rendered and returns the latest observation.
///
/// The gate lives as long as the component, so with `freeze_once_visible`
/// a re-render with new options does not attach a second observer.
#[hook]
pub fn use_in_view(node: NodeRef, options: ObserveOptions) -> Option<Observation> {
    let observation = use_state(|| None::<Observation>);
    let gate = use_memo(|_| ViewportGate::new(DomIntersection), ());

    {
        let observation = observation.clone();
        let gate = (*gate).clone();
        use_effect_with_deps(
            move |options| {
                let target = node.cast::<Element>();
                gate.observe(target.as_ref(), *options, move |obs| observation.set(Some(obs)));
                if !gate.is_observing() && !gate.observation().has_intersected {
                    debug!("use_in_view: node is not rendered yet");
                }
                move || gate.dispose()
            },
            options,
        );
    }

    *observation
}
