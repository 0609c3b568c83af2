use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::debug;

use super::options::{ObserveOptions, Threshold};
use crate::subscription::Subscription;

/// One entry as delivered by the platform's intersection primitive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawEntry {
    pub is_intersecting: bool,
    pub intersection_ratio: f64,
}

/// What subscribers of a [`ViewportGate`] receive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub is_intersecting: bool,
    pub intersection_ratio: f64,
}

impl Observation {
    /// The platform reports touching elements as intersecting even at ratio 0,
    /// so the configured threshold is applied on top.
    pub fn from_entry(entry: &RawEntry, threshold: Threshold) -> Self {
        Self {
            is_intersecting: entry.is_intersecting && entry.intersection_ratio >= threshold.value(),
            intersection_ratio: entry.intersection_ratio,
        }
    }
}

/// Platform seam: attaches a visibility monitor to `target` and returns the
/// subscription that detaches it.
pub trait IntersectionBackend {
    type Target;

    fn connect(
        &self,
        target: &Self::Target,
        options: &ObserveOptions,
        on_entries: Box<dyn Fn(Vec<RawEntry>)>,
    ) -> Subscription;
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewportObservation {
    /// Monotonic: never goes back to false for the lifetime of the gate.
    pub has_intersected: bool,
    pub last: Option<Observation>,
}

#[derive(Default)]
struct GateState {
    observation: ViewportObservation,
    monitor: Option<Subscription>,
    // entries are only honoured for the connection with this id
    active: Option<u64>,
    next_id: u64,
}

/// Visibility detector for a single element.
///
/// Clones share state; the live monitor is released by [`ViewportGate::dispose`]
/// or when the last clone goes away.
pub struct ViewportGate<B: IntersectionBackend> {
    backend: Rc<B>,
    state: Rc<RefCell<GateState>>,
}

impl<B: IntersectionBackend> Clone for ViewportGate<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Rc::clone(&self.backend),
            state: Rc::clone(&self.state),
        }
    }
}

impl<B: IntersectionBackend> ViewportGate<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Rc::new(backend),
            state: Rc::new(RefCell::new(GateState::default())),
        }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn observation(&self) -> ViewportObservation {
        self.state.borrow().observation
    }

    pub fn has_intersected(&self) -> bool {
        self.state.borrow().observation.has_intersected
    }

    pub fn is_observing(&self) -> bool {
        self.state.borrow().monitor.is_some()
    }

    /// Starts monitoring `target`, replacing any monitor from a previous call.
    ///
    /// Returns whether a live monitor was attached. A missing target, or a
    /// frozen gate that already saw its element, attaches nothing.
    pub fn observe(
        &self,
        target: Option<&B::Target>,
        options: ObserveOptions,
        subscriber: impl Fn(Observation) + 'static,
    ) -> bool {
        self.dispose();

        let Some(target) = target else {
            debug!("viewport gate: target not attached yet");
            return false;
        };
        if options.freeze_once_visible && self.has_intersected() {
            return false;
        }

        let id = {
            let mut state = self.state.borrow_mut();
            state.next_id += 1;
            state.active = Some(state.next_id);
            state.next_id
        };

        let on_entries = entry_handler(Rc::downgrade(&self.state), id, options, Rc::new(subscriber));
        let monitor = self.backend.connect(target, &options, on_entries);

        // the backend may deliver (and freeze) synchronously while connecting
        let mut state = self.state.borrow_mut();
        if state.active == Some(id) {
            state.monitor = Some(monitor);
            true
        } else {
            drop(state);
            drop(monitor);
            false
        }
    }

    /// Stops monitoring. Safe to call any number of times.
    pub fn dispose(&self) {
        let monitor = {
            let mut state = self.state.borrow_mut();
            state.active = None;
            state.monitor.take()
        };
        drop(monitor);
    }
}

fn entry_handler(
    state: Weak<RefCell<GateState>>,
    id: u64,
    options: ObserveOptions,
    subscriber: Rc<dyn Fn(Observation)>,
) -> Box<dyn Fn(Vec<RawEntry>)> {
    Box::new(move |entries| {
        let Some(state) = state.upgrade() else {
            return;
        };
        for entry in entries {
            let observation = Observation::from_entry(&entry, options.threshold);
            let released = {
                let mut state = state.borrow_mut();
                if state.active != Some(id) {
                    return;
                }
                state.observation.last = Some(observation);
                if observation.is_intersecting {
                    state.observation.has_intersected = true;
                }
                if observation.is_intersecting && options.freeze_once_visible {
                    state.active = None;
                    state.monitor.take()
                } else {
                    None
                }
            };
            subscriber(observation);
            if released.is_some() {
                debug!("viewport gate: frozen after first intersection");
            }
            drop(released);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FakeConnection {
        target: &'static str,
        on_entries: Rc<dyn Fn(Vec<RawEntry>)>,
        live: Rc<Cell<bool>>,
    }

    #[derive(Default)]
    struct FakeBackend {
        connections: RefCell<Vec<FakeConnection>>,
        // entries delivered from inside connect(), like an element already on screen
        deliver_on_connect: Option<RawEntry>,
    }

    impl FakeBackend {
        fn connection_count(&self) -> usize {
            self.connections.borrow().len()
        }

        fn live_count(&self) -> usize {
            self.connections.borrow().iter().filter(|c| c.live.get()).count()
        }

        fn is_live(&self, index: usize) -> bool {
            self.connections.borrow()[index].live.get()
        }

        /// Delivers like the platform would: only to live monitors.
        fn emit(&self, index: usize, intersecting: bool, ratio: f64) {
            let callback = {
                let connections = self.connections.borrow();
                let connection = &connections[index];
                if !connection.live.get() {
                    return;
                }
                Rc::clone(&connection.on_entries)
            };
            callback(vec![entry(intersecting, ratio)]);
        }

        /// Delivers regardless of liveness, like a queued platform callback.
        fn emit_stale(&self, index: usize, intersecting: bool, ratio: f64) {
            let callback = Rc::clone(&self.connections.borrow()[index].on_entries);
            callback(vec![entry(intersecting, ratio)]);
        }
    }

    impl IntersectionBackend for FakeBackend {
        type Target = &'static str;

        fn connect(
            &self,
            target: &Self::Target,
            _options: &ObserveOptions,
            on_entries: Box<dyn Fn(Vec<RawEntry>)>,
        ) -> Subscription {
            let live = Rc::new(Cell::new(true));
            let on_entries: Rc<dyn Fn(Vec<RawEntry>)> = Rc::from(on_entries);
            self.connections.borrow_mut().push(FakeConnection {
                target,
                on_entries: Rc::clone(&on_entries),
                live: Rc::clone(&live),
            });
            if let Some(first) = self.deliver_on_connect {
                on_entries(vec![first]);
            }
            Subscription::new(move || live.set(false))
        }
    }

    fn entry(is_intersecting: bool, intersection_ratio: f64) -> RawEntry {
        RawEntry {
            is_intersecting,
            intersection_ratio,
        }
    }

    fn recorder() -> (Rc<RefCell<Vec<Observation>>>, impl Fn(Observation) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |obs| sink.borrow_mut().push(obs))
    }

    #[test]
    fn unattached_target_is_a_noop() {
        let gate = ViewportGate::new(FakeBackend::default());
        let (seen, sink) = recorder();
        assert!(!gate.observe(None, ObserveOptions::default(), sink));
        assert_eq!(gate.backend().connection_count(), 0);
        assert!(!gate.is_observing());
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn freeze_once_visible_stops_after_first_intersection() {
        let gate = ViewportGate::new(FakeBackend::default());
        let (seen, sink) = recorder();
        let options = ObserveOptions::once(0.0).unwrap();
        assert!(gate.observe(Some(&"hero"), options, sink));

        gate.backend().emit(0, false, 0.0);
        gate.backend().emit(0, true, 0.4);
        assert!(!gate.backend().is_live(0));
        assert!(!gate.is_observing());

        // leaves and re-enters: nothing is delivered any more
        gate.backend().emit_stale(0, false, 0.0);
        gate.backend().emit_stale(0, true, 0.9);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(!seen[0].is_intersecting);
        assert!(seen[1].is_intersecting);
        assert!(gate.has_intersected());
    }

    #[test]
    fn frozen_gate_does_not_reattach_on_rerender() {
        let gate = ViewportGate::new(FakeBackend::default());
        let options = ObserveOptions::once(0.0).unwrap();
        gate.observe(Some(&"hero"), options, |_| {});
        gate.backend().emit(0, true, 1.0);

        for _ in 0..5 {
            assert!(!gate.observe(Some(&"hero"), options, |_| {}));
        }
        assert_eq!(gate.backend().connection_count(), 1);
        assert_eq!(gate.backend().live_count(), 0);
    }

    #[test]
    fn without_freeze_every_change_is_forwarded() {
        let gate = ViewportGate::new(FakeBackend::default());
        let (seen, sink) = recorder();
        gate.observe(Some(&"card"), ObserveOptions::default(), sink);

        gate.backend().emit(0, true, 0.5);
        gate.backend().emit(0, false, 0.0);
        gate.backend().emit(0, true, 1.0);

        assert_eq!(seen.borrow().len(), 3);
        assert!(gate.is_observing());
        assert!(gate.has_intersected());
        assert_eq!(gate.observation().last.map(|o| o.intersection_ratio), Some(1.0));
    }

    #[test]
    fn threshold_is_applied_to_reported_ratio() {
        let gate = ViewportGate::new(FakeBackend::default());
        let (seen, sink) = recorder();
        let options = ObserveOptions {
            threshold: Threshold::new(0.5).unwrap(),
            ..ObserveOptions::default()
        };
        gate.observe(Some(&"card"), options, sink);

        gate.backend().emit(0, true, 0.2);
        gate.backend().emit(0, true, 0.5);

        let seen = seen.borrow();
        assert!(!seen[0].is_intersecting);
        assert!(seen[1].is_intersecting);
    }

    #[test]
    fn reobserve_replaces_previous_monitor() {
        let gate = ViewportGate::new(FakeBackend::default());
        let (seen, sink) = recorder();
        gate.observe(Some(&"a"), ObserveOptions::default(), |_| {});
        gate.observe(Some(&"b"), ObserveOptions::default(), sink);

        assert_eq!(gate.backend().connection_count(), 2);
        assert!(!gate.backend().is_live(0));
        assert!(gate.backend().is_live(1));
        assert_eq!(gate.backend().connections.borrow()[1].target, "b");

        // stale entries from the first monitor are ignored
        gate.backend().emit_stale(0, true, 1.0);
        assert!(seen.borrow().is_empty());
        assert!(!gate.has_intersected());
    }

    #[test]
    fn dispose_is_idempotent_and_drop_releases() {
        let gate = ViewportGate::new(FakeBackend::default());
        gate.observe(Some(&"a"), ObserveOptions::default(), |_| {});
        gate.dispose();
        gate.dispose();
        assert_eq!(gate.backend().live_count(), 0);

        let backend_gate = ViewportGate::new(FakeBackend::default());
        backend_gate.observe(Some(&"a"), ObserveOptions::default(), |_| {});
        let live = Rc::clone(&backend_gate.backend().connections.borrow()[0].live);
        drop(backend_gate);
        assert!(!live.get());
    }

    #[test]
    fn synchronous_first_delivery_still_freezes() {
        let backend = FakeBackend {
            deliver_on_connect: Some(entry(true, 1.0)),
            ..FakeBackend::default()
        };
        let gate = ViewportGate::new(backend);
        let (seen, sink) = recorder();
        assert!(!gate.observe(Some(&"above-the-fold"), ObserveOptions::once(0.0).unwrap(), sink));
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(gate.backend().live_count(), 0);
        assert!(gate.has_intersected());
    }
}
