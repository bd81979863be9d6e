use crate::state::StateValues;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Read-only view of the scopes active at capture time.
pub trait ScopeChain {
    /// Call `visit` once per active frame, outermost first.
    fn for_each_scope(&self, visit: &mut dyn FnMut(&dyn StateValues));
}

impl<T: StateValues> ScopeChain for [T] {
    fn for_each_scope(&self, visit: &mut dyn FnMut(&dyn StateValues)) {
        for frame in self {
            visit(frame);
        }
    }
}

impl<T: StateValues> ScopeChain for Vec<T> {
    fn for_each_scope(&self, visit: &mut dyn FnMut(&dyn StateValues)) {
        self.as_slice().for_each_scope(visit)
    }
}

/// Source of the per-thread scope stack shared by all loggers of one
/// provider.
pub trait ScopeProvider: ScopeChain + Send + Sync {
    /// Make `state` the innermost scope of the calling thread until the
    /// returned guard is dropped.
    fn push(&self, state: Box<dyn StateValues>) -> ScopeGuard;
}

/// Ends a scope when dropped.
///
/// Guards are bound to the thread that created them.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct ScopeGuard {
    release: Option<Box<dyn FnOnce()>>,
}

impl ScopeGuard {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        ScopeGuard {
            release: Some(Box::new(release)),
        }
    }

    /// Guard for a scope that was never pushed.
    pub fn noop() -> Self {
        ScopeGuard { release: None }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("active", &self.release.is_some())
            .finish()
    }
}

type Frames = Vec<Rc<dyn StateValues>>;

thread_local! {
    // Keyed by provider id, so independent providers never see each other's scopes.
    static SCOPES: RefCell<HashMap<u64, Frames>> = RefCell::new(HashMap::new());
}

static NEXT_PROVIDER_ID: AtomicU64 = AtomicU64::new(1);

/// Default [`ScopeProvider`]: a thread-local stack per provider instance.
///
/// Each thread sees only the scopes it pushed itself. Dropping a guard
/// truncates the stack back to the depth it had when the scope was pushed.
#[derive(Debug)]
pub struct ThreadScopeProvider {
    id: u64,
}

impl ThreadScopeProvider {
    pub fn new() -> Self {
        ThreadScopeProvider {
            id: NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Number of scopes active on the calling thread.
    pub fn depth(&self) -> usize {
        SCOPES
            .try_with(|scopes| scopes.borrow().get(&self.id).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl Default for ThreadScopeProvider {
    fn default() -> Self {
        ThreadScopeProvider::new()
    }
}

impl ScopeChain for ThreadScopeProvider {
    fn for_each_scope(&self, visit: &mut dyn FnMut(&dyn StateValues)) {
        // Copy the frame list out so a visitor may push or log re-entrantly.
        // Once the thread-local is torn down the thread has no scopes.
        let frames: Frames = SCOPES
            .try_with(|scopes| {
                scopes
                    .borrow()
                    .get(&self.id)
                    .cloned()
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        for frame in &frames {
            visit(&**frame);
        }
    }
}

impl ScopeProvider for ThreadScopeProvider {
    fn push(&self, state: Box<dyn StateValues>) -> ScopeGuard {
        let id = self.id;
        let pushed = SCOPES.try_with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            let stack = scopes.entry(id).or_default();
            stack.push(Rc::from(state));
            stack.len() - 1
        });
        // Pushing during thread teardown has nothing to attach to.
        let Ok(depth) = pushed else {
            return ScopeGuard::noop();
        };

        ScopeGuard::new(move || {
            // The thread-local may already be gone during thread teardown.
            let popped = SCOPES
                .try_with(|scopes| {
                    let mut scopes = scopes.borrow_mut();
                    let popped = match scopes.get_mut(&id) {
                        Some(stack) if stack.len() > depth => stack.split_off(depth),
                        _ => Vec::new(),
                    };
                    if scopes.get(&id).is_some_and(Vec::is_empty) {
                        scopes.remove(&id);
                    }
                    popped
                })
                .unwrap_or_default();
            drop(popped);
        })
    }
}

impl Drop for ThreadScopeProvider {
    fn drop(&mut self) {
        let removed = SCOPES
            .try_with(|scopes| scopes.borrow_mut().remove(&self.id))
            .ok()
            .flatten();
        drop(removed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LogState;

    fn messages(chain: &dyn ScopeChain) -> Vec<String> {
        let mut out = Vec::new();
        chain.for_each_scope(&mut |frame| out.push(frame.to_string()));
        out
    }

    #[test]
    fn nested_scopes_are_outermost_first() {
        let provider = ThreadScopeProvider::new();
        let _a = provider.push(Box::new("A".to_string()));
        let _b = provider.push(Box::new("B".to_string()));

        assert_eq!(messages(&provider), vec!["A", "B"]);
        assert_eq!(provider.depth(), 2);
    }

    #[test]
    fn dropping_guard_pops_scope() {
        let provider = ThreadScopeProvider::new();
        let outer = provider.push(Box::new("outer".to_string()));
        {
            let _inner = provider.push(Box::new("inner".to_string()));
            assert_eq!(provider.depth(), 2);
        }
        assert_eq!(messages(&provider), vec!["outer"]);
        drop(outer);
        assert!(messages(&provider).is_empty());
    }

    #[test]
    fn out_of_order_drop_restores_depth() {
        let provider = ThreadScopeProvider::new();
        let outer = provider.push(Box::new("outer".to_string()));
        let inner = provider.push(Box::new("inner".to_string()));

        drop(outer);
        assert_eq!(provider.depth(), 0);
        drop(inner);
        assert_eq!(provider.depth(), 0);
    }

    #[test]
    fn providers_do_not_share_scopes() {
        let first = ThreadScopeProvider::new();
        let second = ThreadScopeProvider::new();
        let _guard = first.push(Box::new("only first".to_string()));

        assert_eq!(first.depth(), 1);
        assert_eq!(second.depth(), 0);
    }

    #[test]
    fn scopes_are_per_thread() {
        let provider = std::sync::Arc::new(ThreadScopeProvider::new());
        let _guard = provider.push(Box::new("main".to_string()));

        let other = std::sync::Arc::clone(&provider);
        let seen = std::thread::spawn(move || other.depth())
            .join()
            .expect("thread panicked");

        assert_eq!(seen, 0);
        assert_eq!(provider.depth(), 1);
    }

    #[test]
    fn visitor_may_push_while_walking() {
        let provider = ThreadScopeProvider::new();
        let _guard = provider.push(Box::new("A".to_string()));

        let mut nested = Vec::new();
        provider.for_each_scope(&mut |_| nested.push(provider.push(Box::new("X".to_string()))));
        assert_eq!(provider.depth(), 2);
        drop(nested);
        assert_eq!(provider.depth(), 1);
    }

    #[test]
    fn slices_walk_in_order() {
        let frames = vec![LogState::new("one", Vec::new()), LogState::new("two", Vec::new())];
        assert_eq!(messages(&frames), vec!["one", "two"]);
        assert!(messages(&Vec::<LogState>::new()).is_empty());
    }

    #[test]
    fn noop_guard_does_nothing() {
        let guard = ScopeGuard::noop();
        assert!(format!("{:?}", guard).contains("false"));
    }
}
