//! Cooperative cancellation
//!
//! A [`CancelToken`] is shared between whoever may abandon a unit of work and
//! the resources that work holds. Backends register a hook on the token of
//! the thread that opens a connection, so cancelling the token interrupts
//! the statement running on that connection.
//!
//! The token is carried implicitly: [`CancelToken::scope`] makes it the
//! current token of the calling thread for the duration of a closure, and
//! [`CancelToken::current`] reads it back from anywhere inside.

use crate::error::{Result, SluiceError};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

type Hook = Box<dyn Fn() + Send + Sync>;

thread_local! {
    static CURRENT: RefCell<Option<CancelToken>> = const { RefCell::new(None) };
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    next_hook: AtomicU64,
    hooks: Mutex<Vec<(u64, Hook)>>,
}

/// Shared cancellation flag with interrupt hooks.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the token cancelled and fire every registered hook once.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let hooks = std::mem::take(&mut *self.inner.hooks.lock());
        for (_, hook) in hooks {
            hook();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once the token has been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SluiceError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run `hook` when the token is cancelled.
    ///
    /// The hook runs immediately if the token is already cancelled. Dropping
    /// the returned registration removes a hook that has not fired yet.
    pub fn on_cancel<F>(&self, hook: F) -> CancelRegistration
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_hook.fetch_add(1, Ordering::Relaxed);
        {
            let mut hooks = self.inner.hooks.lock();
            // Checked under the lock so a concurrent cancel cannot miss the hook.
            if !self.is_cancelled() {
                hooks.push((id, Box::new(hook)));
                return CancelRegistration {
                    token: Some(self.clone()),
                    id,
                };
            }
        }
        hook();
        CancelRegistration { token: None, id }
    }

    /// Run `f` with this token as the calling thread's current token.
    ///
    /// The previous token is restored afterwards, including when `f` panics.
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        struct Restore(Option<CancelToken>);

        impl Drop for Restore {
            fn drop(&mut self) {
                let previous = self.0.take();
                CURRENT.with(|current| *current.borrow_mut() = previous);
            }
        }

        let previous = CURRENT.with(|current| current.borrow_mut().replace(self.clone()));
        let _restore = Restore(previous);
        f()
    }

    /// The token installed by the innermost enclosing [`scope`](Self::scope)
    /// on this thread.
    pub fn current() -> Option<CancelToken> {
        CURRENT.with(|current| current.borrow().clone())
    }

    #[cfg(test)]
    fn hook_count(&self) -> usize {
        self.inner.hooks.lock().len()
    }
}

/// Keeps a cancel hook registered until dropped.
#[must_use = "the hook is removed when the registration is dropped"]
pub struct CancelRegistration {
    token: Option<CancelToken>,
    id: u64,
}

impl fmt::Debug for CancelRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelRegistration").field("id", &self.id).finish()
    }
}

impl Drop for CancelRegistration {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.inner.hooks.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cancel_fires_hooks_once() {
        let token = CancelToken::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _registration = token.on_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(token.check().is_ok());
        token.cancel();
        token.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(matches!(token.check(), Err(SluiceError::Cancelled)));
    }

    #[test]
    fn test_hook_on_cancelled_token_runs_immediately() {
        let token = CancelToken::new();
        token.cancel();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let _registration = token.on_cancel(move || flag.store(true, Ordering::SeqCst));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_dropped_registration_is_removed() {
        let token = CancelToken::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let registration = token.on_cancel(move || flag.store(true, Ordering::SeqCst));
        assert_eq!(token.hook_count(), 1);

        drop(registration);
        assert_eq!(token.hook_count(), 0);
        token.cancel();
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_scope_sets_and_restores_current() {
        assert!(CancelToken::current().is_none());
        let outer = CancelToken::new();
        let inner = CancelToken::new();
        inner.cancel();

        outer.scope(|| {
            assert!(!CancelToken::current().unwrap().is_cancelled());
            inner.scope(|| assert!(CancelToken::current().unwrap().is_cancelled()));
            assert!(!CancelToken::current().unwrap().is_cancelled());
        });
        assert!(CancelToken::current().is_none());
    }

    #[test]
    fn test_scope_restores_after_panic() {
        let token = CancelToken::new();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            token.scope(|| panic!("boom"))
        }));
        assert!(outcome.is_err());
        assert!(CancelToken::current().is_none());
    }
}
