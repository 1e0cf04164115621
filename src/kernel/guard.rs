use std::cell::RefCell;

thread_local! {
    // Owners whose guard is held on this thread.
    static HELD: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Held for the duration of one call into an engine instance on this thread.
///
/// A handler that calls back into the same instance from inside such a call
/// (a `tracing` layer feeding errors back in, a crash hook) gets `None` and
/// must drop the call. Other instances are unaffected: `owner` identifies
/// the instance.
#[derive(Debug)]
pub struct ReentrancyGuard {
    owner: usize,
}

impl ReentrancyGuard {
    pub fn enter(owner: usize) -> Option<Self> {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            if held.contains(&owner) {
                None
            } else {
                held.push(owner);
                Some(Self { owner })
            }
        })
    }

    pub fn is_held(owner: usize) -> bool {
        HELD.with(|held| held.borrow().contains(&owner))
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        // The slot may already be gone during thread teardown.
        let _ = HELD.try_with(|held| held.borrow_mut().retain(|&owner| owner != self.owner));
    }
}
