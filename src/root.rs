//! Stack-anchored owning handles.
//!
//! A [`Root`] owns an anchor on a region proxy: for as long as any root of
//! a ring is alive, none of the ring's nodes are reclaimed. Dropping the
//! last root of a ring destroys every member node in registration order,
//! whether or not the members form cycles, and then frees the ring. This
//! is the sole trigger of reclamation.

use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ops::Deref;
use core::ptr::NonNull;

use alloc::alloc::handle_alloc_error;

use crate::node::{allocate_into, allocate_into_with, assign_parts, Node};
use crate::pool::{AllocError, Heap, NodePool};
use crate::proxy::{HasProxy, Proxy};
use crate::ptr::{NodeBox, Pointee};

/// The stack-anchored owning handle of a region.
///
/// Creating a root creates a fresh region; allocations made through the
/// root (or anything else that projects its proxy) are adopted into that
/// region. Roots are safe to use: holding one keeps its whole ring alive,
/// so a root's payload can never dangle.
///
/// # Examples
///
/// Two regions joined into one ring by a cross-region reference, then
/// reclaimed together once the last root drops:
///
/// ```
/// use core::cell::RefCell;
/// use rootrc::{HasProxy, Node, Root};
///
/// struct Gadget {
///     peer: RefCell<Option<Node<Gadget>>>,
/// }
///
/// let a = Root::new(Gadget { peer: RefCell::new(None) });
/// let b = Root::new(Gadget { peer: RefCell::new(None) });
///
/// // a.peer = b; unifies the two regions into one ring
/// let mut forward: Node<Gadget> = unsafe { Node::new(a.proxy()) };
/// forward.assign_root(&b);
/// *a.get().unwrap().peer.borrow_mut() = Some(forward);
///
/// // b.peer = a; completes a cycle across the merged region
/// let mut back: Node<Gadget> = unsafe { Node::new(b.proxy()) };
/// back.assign_root(&a);
/// *b.get().unwrap().peer.borrow_mut() = Some(back);
///
/// assert_eq!(a.proxy().ring_size(), 2);
/// drop(a); // nothing destroyed, b still anchors the ring
/// drop(b); // both gadgets destroyed, cycle and all
/// ```
pub struct Root<T> {
    pointee: Option<Pointee<T>>,
    proxy: NonNull<Proxy>,
    _marker: PhantomData<T>,
}

impl<T> Root<T> {
    /// Create a fresh region with no payload.
    ///
    /// The root is usable for assignment and as a `make_node` target.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            pointee: None,
            proxy: Proxy::create(),
            _marker: PhantomData,
        }
    }

    /// Create a fresh region holding `value` as its first node.
    ///
    /// Aborts the process on allocation failure; see [`Root::try_new`].
    #[must_use]
    pub fn new(value: T) -> Self {
        match Self::try_new(value) {
            Ok(root) => root,
            Err(AllocError) => handle_alloc_error(NodeBox::<T>::layout()),
        }
    }

    /// Fallible [`Root::new`].
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the default pool is exhausted. No region
    /// is left behind.
    pub fn try_new(value: T) -> Result<Self, AllocError> {
        Self::try_new_in(value, Heap)
    }

    /// [`Root::new`] with an injected pool for the first node.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if `pool` is exhausted. No region is left
    /// behind.
    pub fn try_new_in<A: NodePool>(value: T, pool: A) -> Result<Self, AllocError> {
        let proxy = Proxy::create();
        let anchor = AnchorGuard { proxy };
        let pointee = unsafe { allocate_into(proxy, value, pool)? };
        mem::forget(anchor);
        Ok(Self {
            pointee: Some(pointee),
            proxy,
            _marker: PhantomData,
        })
    }

    /// Create a fresh region whose first payload is built by `f`.
    ///
    /// `f` receives the new region's proxy, so the payload can construct
    /// its own [`Node`] handles before it is adopted. Aborts the process on
    /// allocation failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use core::cell::RefCell;
    /// use rootrc::{Node, Root};
    ///
    /// struct Cell {
    ///     next: RefCell<Option<Node<Cell>>>,
    /// }
    ///
    /// let root = Root::new_with(|proxy| Cell {
    ///     next: RefCell::new(Some(unsafe { Node::new(proxy) })),
    /// });
    /// assert!(root.get().is_some());
    /// ```
    #[must_use]
    pub fn new_with<F: FnOnce(&Proxy) -> T>(f: F) -> Self {
        match Self::try_new_with_in(f, Heap) {
            Ok(root) => root,
            Err(AllocError) => handle_alloc_error(NodeBox::<T>::layout()),
        }
    }

    /// Fallible [`Root::new_with`] with an injected pool.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if `pool` is exhausted; `f` is never called
    /// and no region is left behind.
    pub fn try_new_with_in<A, F>(f: F, pool: A) -> Result<Self, AllocError>
    where
        A: NodePool,
        F: FnOnce(&Proxy) -> T,
    {
        let proxy = Proxy::create();
        let anchor = AnchorGuard { proxy };
        let pointee = unsafe { allocate_into_with(proxy, f, pool)? };
        mem::forget(anchor);
        Ok(Self {
            pointee: Some(pointee),
            proxy,
            _marker: PhantomData,
        })
    }

    pub(crate) fn parts(&self) -> (Option<Pointee<T>>, NonNull<Proxy>) {
        (self.pointee, self.proxy)
    }

    /// Borrow the payload, or `None` if the root is empty.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.pointee.as_ref().map(|p| unsafe { p.value.as_ref() })
    }

    /// Release the payload. The root keeps its region and anchor and can
    /// be assigned again.
    pub fn reset(&mut self) {
        let destroying = unsafe { self.proxy.as_ref().is_destroying() };
        if let Some(p) = self.pointee.take() {
            if !destroying {
                unsafe { p.head.as_ref().dec_strong() };
            }
        }
    }

    /// Make this root refer to `other`'s payload, unifying the two rings.
    ///
    /// The new payload is retained before the old one is released; the
    /// root's anchor is untouched.
    pub fn assign(&mut self, other: &Root<T>) {
        let (src, src_proxy) = other.parts();
        unsafe { assign_parts(self.proxy, &mut self.pointee, src, src_proxy) };
    }

    /// Make this root refer to a node handle's payload, unifying this
    /// root's ring with the node's ring.
    pub fn assign_node(&mut self, other: &Node<T>) {
        let (src, src_proxy) = other.parts();
        unsafe { assign_parts(self.proxy, &mut self.pointee, src, src_proxy) };
    }

    /// Strong count of the payload, or zero for an empty root.
    #[must_use]
    pub fn strong_count(this: &Self) -> usize {
        this.pointee
            .as_ref()
            .map_or(0, |p| unsafe { p.head.as_ref().strong() })
    }

    /// Whether two roots refer to the same node.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        match (&this.pointee, &other.pointee) {
            (Some(a), Some(b)) => a.same(b),
            _ => false,
        }
    }
}

impl<T> HasProxy for Root<T> {
    fn proxy(&self) -> &Proxy {
        unsafe { self.proxy.as_ref() }
    }
}

impl<T> Default for Root<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Clone for Root<T> {
    /// Clone the root: one more anchor on the same proxy, one more strong
    /// count on the payload.
    fn clone(&self) -> Self {
        unsafe { self.proxy.as_ref().anchor_inc() };
        if let Some(p) = &self.pointee {
            unsafe { p.head.as_ref().inc_strong() };
        }
        Self {
            pointee: self.pointee,
            proxy: self.proxy,
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for Root<T> {
    /// Release the payload and the anchor. If this was the last anchor of
    /// the ring, the whole region is destroyed before `drop` returns.
    fn drop(&mut self) {
        unsafe {
            // A root stored inside a payload is a contract violation, but
            // it must not disturb a teardown already in progress.
            if self.proxy.as_ref().is_destroying() {
                return;
            }
            if let Some(p) = self.pointee.take() {
                p.head.as_ref().dec_strong();
            }
            Proxy::anchor_dec(self.proxy);
        }
    }
}

impl<T> Deref for Root<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the root is empty; use [`Root::get`] to probe.
    fn deref(&self) -> &Self::Target {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced an empty Root handle"),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Root<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("Root").field(value).finish(),
            None => f.write_str("Root(<empty>)"),
        }
    }
}

struct AnchorGuard {
    proxy: NonNull<Proxy>,
}

impl Drop for AnchorGuard {
    fn drop(&mut self) {
        unsafe { Proxy::anchor_dec(self.proxy) };
    }
}

/// Allocate a fresh region and a node holding `value`, anchored by the
/// returned root.
///
/// Equivalent to [`Root::new`].
#[must_use]
pub fn make_root<T>(value: T) -> Root<T> {
    Root::new(value)
}
