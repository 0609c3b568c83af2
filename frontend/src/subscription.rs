/// A live registration that is torn down exactly once, either explicitly via
/// [`Subscription::unsubscribe`] or when dropped.
///
/// Used for platform observers (intersection, performance) and for registry
/// listeners alike, so every callback registration has a matching release on
/// every exit path.
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A subscription with nothing to release.
    pub fn noop() -> Self {
        Self { teardown: None }
    }

    pub fn is_active(&self) -> bool {
        self.teardown.is_some()
    }

    pub fn unsubscribe(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
