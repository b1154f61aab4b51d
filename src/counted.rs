//! Reference-counting profiles for shared tree nodes
//!
//! A tree commits to one profile at creation through its type parameter:
//! `Exclusive` (plain counts, single-threaded) or `Atomic` (hardware
//! fetch-add/sub, safe when holders span threads). The two never mix within
//! one structure because `Node<Exclusive>` and `Node<Atomic>` are distinct
//! types.
//!
//! `retain` increments the count, `release` decrements it; the payload's
//! `Drop` impl is the teardown and runs exactly once, at the zero
//! transition. A release without a matching outstanding retain cannot be
//! written: `release` consumes the handle.

use std::ops::Deref;
use std::rc::Rc;
use std::sync::Arc;

/// A counting profile: a family of shared handles over arbitrary payloads.
pub trait RefCount {
    type Ptr<T: ?Sized>: Deref<Target = T> + Clone;

    /// Wrap a payload in a fresh handle with count 1.
    fn new<T>(value: T) -> Self::Ptr<T>;

    /// Share a byte slice as a counted chunk.
    fn from_bytes(bytes: &[u8]) -> Self::Ptr<[u8]>;

    /// Number of live holders of the payload.
    fn holders<T: ?Sized>(ptr: &Self::Ptr<T>) -> usize;

    /// Whether two handles point at the same payload.
    fn ptr_eq<T: ?Sized>(a: &Self::Ptr<T>, b: &Self::Ptr<T>) -> bool;

    /// Take an additional count on the payload.
    fn retain<T: ?Sized>(ptr: &Self::Ptr<T>) -> Self::Ptr<T> {
        ptr.clone()
    }

    /// Give up one count; the payload's `Drop` runs iff this was the last.
    fn release<T: ?Sized>(ptr: Self::Ptr<T>) {
        drop(ptr);
    }
}

/// Single-threaded profile: plain increment/decrement via `Rc`.
pub struct Exclusive;

impl RefCount for Exclusive {
    type Ptr<T: ?Sized> = Rc<T>;

    fn new<T>(value: T) -> Rc<T> {
        Rc::new(value)
    }

    fn from_bytes(bytes: &[u8]) -> Rc<[u8]> {
        Rc::from(bytes)
    }

    fn holders<T: ?Sized>(ptr: &Rc<T>) -> usize {
        Rc::strong_count(ptr)
    }

    fn ptr_eq<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
        Rc::ptr_eq(a, b)
    }
}

/// Thread-safe profile: atomic fetch-add/sub via `Arc`. Exactly one
/// releaser observes the zero transition under concurrent release.
pub struct Atomic;

impl RefCount for Atomic {
    type Ptr<T: ?Sized> = Arc<T>;

    fn new<T>(value: T) -> Arc<T> {
        Arc::new(value)
    }

    fn from_bytes(bytes: &[u8]) -> Arc<[u8]> {
        Arc::from(bytes)
    }

    fn holders<T: ?Sized>(ptr: &Arc<T>) -> usize {
        Arc::strong_count(ptr)
    }

    fn ptr_eq<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
        Arc::ptr_eq(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Payload whose teardown bumps a counter.
    struct Probe(Arc<AtomicUsize>);

    impl Drop for Probe {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_exclusive_teardown_runs_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let probe = Exclusive::new(Probe(drops.clone()));

        let extra = Exclusive::retain(&probe);
        assert_eq!(Exclusive::holders(&probe), 2);

        Exclusive::release(extra);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(Exclusive::holders(&probe), 1);

        Exclusive::release(probe);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_atomic_teardown_runs_once_across_threads() {
        let drops = Arc::new(AtomicUsize::new(0));
        let probe = Atomic::new(Probe(drops.clone()));

        let handles: Vec<_> = (0..8).map(|_| Atomic::retain(&probe)).collect();
        assert_eq!(Atomic::holders(&probe), 9);

        thread::scope(|scope| {
            for handle in handles {
                scope.spawn(move || Atomic::release(handle));
            }
        });

        assert_eq!(drops.load(Ordering::SeqCst), 0);
        Atomic::release(probe);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_cascades_through_links() {
        // Mirrors a linked structure whose teardown releases its child.
        struct Link {
            _next: Option<Rc<Link>>,
            _probe: Probe,
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let tail = Exclusive::new(Link {
            _next: None,
            _probe: Probe(drops.clone()),
        });
        let head = Exclusive::new(Link {
            _next: Some(Exclusive::retain(&tail)),
            _probe: Probe(drops.clone()),
        });

        Exclusive::release(tail);
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        Exclusive::release(head);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_ptr_eq_and_shared_bytes() {
        let chunk = Atomic::from_bytes(b"hello");
        let alias = Atomic::retain(&chunk);
        assert!(Atomic::ptr_eq(&chunk, &alias));
        assert_eq!(&*alias, b"hello");

        let other = Atomic::from_bytes(b"hello");
        assert!(!Atomic::ptr_eq(&chunk, &other));
    }
}
