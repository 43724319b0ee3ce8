//! Intra-region handles.
//!
//! A [`Node`] is the handle type that lives *inside* payloads. It carries a
//! strong count on its pointee and a back-reference to the proxy of the
//! region it was created in, but it never anchors that region: dropping a
//! `Node` only releases the count. Reclamation is driven exclusively by
//! [`Root`] handles.
//!
//! Assignment between node handles whose proxies belong to different rings
//! unifies the rings first, which is how disjoint regions grow together
//! into a single unit of destruction.

use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ops::Deref;
use core::ptr::NonNull;

use alloc::alloc::handle_alloc_error;

use crate::pool::{AllocError, Heap, NodePool};
use crate::proxy::{HasProxy, Proxy};
use crate::ptr::{NodeBox, NodeHead, Pointee};
use crate::root::Root;

/// A handle to a node, stored inside payloads reachable from some region.
///
/// `Node` is created against an existing region and is only valid while
/// that region is alive; see the safety contracts on [`Node::new`] and the
/// [`make_node`] family. While its region is being destroyed, all count
/// bookkeeping on the handle is suppressed so that payload destructors
/// cannot re-enter the teardown. This is what makes reference cycles safe.
pub struct Node<T> {
    pointee: Option<Pointee<T>>,
    proxy: NonNull<Proxy>,
    _marker: PhantomData<T>,
}

impl<T> Node<T> {
    /// Create an empty handle bound to an existing region.
    ///
    /// The handle manages no payload until one is assigned into it. It
    /// never creates a region of its own.
    ///
    /// # Safety
    ///
    /// The handle, and every handle cloned or assigned from it, must not
    /// outlive the last [`Root`] anchoring `proxy`'s ring. The intended
    /// home for a `Node` is a field of a payload allocated in that same
    /// ring; stack-held node handles must be dropped before the region's
    /// roots.
    #[must_use]
    pub unsafe fn new(proxy: &Proxy) -> Self {
        Self {
            pointee: None,
            proxy: NonNull::from(proxy),
            _marker: PhantomData,
        }
    }

    pub(crate) fn from_parts(pointee: Option<Pointee<T>>, proxy: NonNull<Proxy>) -> Self {
        Self {
            pointee,
            proxy,
            _marker: PhantomData,
        }
    }

    pub(crate) fn parts(&self) -> (Option<Pointee<T>>, NonNull<Proxy>) {
        (self.pointee, self.proxy)
    }

    /// Borrow the payload, or `None` if the handle is empty.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.pointee.as_ref().map(|p| unsafe { p.value.as_ref() })
    }

    /// Release the payload. The handle stays bound to its region and can
    /// be assigned again.
    pub fn reset(&mut self) {
        let destroying = unsafe { self.proxy.as_ref().is_destroying() };
        if let Some(p) = self.pointee.take() {
            if !destroying {
                unsafe { p.head.as_ref().dec_strong() };
            }
        }
    }

    /// Make this handle refer to `other`'s payload.
    ///
    /// If the two handles' proxies are in different rings, the rings are
    /// unified first; afterwards the new payload is retained and the old
    /// one released. Self-assignment leaves counts and membership
    /// untouched.
    pub fn assign(&mut self, other: &Node<T>) {
        let (src, src_proxy) = other.parts();
        unsafe { assign_parts(self.proxy, &mut self.pointee, src, src_proxy) };
    }

    /// Make this handle refer to the payload of a root handle, unifying
    /// this handle's ring with the root's region.
    ///
    /// This is how a reference to a root is stored inside another region's
    /// payload (`a.next = b` across regions).
    pub fn assign_root(&mut self, other: &Root<T>) {
        let (src, src_proxy) = other.parts();
        unsafe { assign_parts(self.proxy, &mut self.pointee, src, src_proxy) };
    }

    /// Strong count of the payload, or zero for an empty handle.
    #[must_use]
    pub fn strong_count(this: &Self) -> usize {
        this.pointee
            .as_ref()
            .map_or(0, |p| unsafe { p.head.as_ref().strong() })
    }

    /// Whether two handles refer to the same node.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        match (&this.pointee, &other.pointee) {
            (Some(a), Some(b)) => a.same(b),
            _ => false,
        }
    }
}

impl<T> HasProxy for Node<T> {
    fn proxy(&self) -> &Proxy {
        unsafe { self.proxy.as_ref() }
    }
}

impl<T> Clone for Node<T> {
    /// Clone the handle, retaining the payload. The clone is bound to the
    /// same proxy.
    fn clone(&self) -> Self {
        let destroying = unsafe { self.proxy.as_ref().is_destroying() };
        if let Some(p) = &self.pointee {
            if !destroying {
                unsafe { p.head.as_ref().inc_strong() };
            }
        }
        Self::from_parts(self.pointee, self.proxy)
    }
}

impl<T> Drop for Node<T> {
    /// Release the payload count. Never triggers reclamation: node handles
    /// are not anchors. A no-op while the owning ring is destroying.
    fn drop(&mut self) {
        unsafe {
            if self.proxy.as_ref().is_destroying() {
                return;
            }
            if let Some(p) = self.pointee.take() {
                p.head.as_ref().dec_strong();
            }
        }
    }
}

impl<T> Deref for Node<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the handle is empty; use [`Node::get`] to probe.
    fn deref(&self) -> &Self::Target {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced an empty Node handle"),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("Node").field(value).finish(),
            None => f.write_str("Node(<empty>)"),
        }
    }
}

/// Core assignment: unify the rings, retain the new payload, release the
/// old one. While either ring is destroying the pointer slot is replaced
/// but no counts move.
pub(crate) unsafe fn assign_parts<T>(
    dst_proxy: NonNull<Proxy>,
    dst: &mut Option<Pointee<T>>,
    src: Option<Pointee<T>>,
    src_proxy: NonNull<Proxy>,
) {
    if dst_proxy.as_ref().is_destroying() || src_proxy.as_ref().is_destroying() {
        *dst = src;
        return;
    }
    Proxy::unify(dst_proxy, src_proxy);
    if let (Some(old), Some(new)) = (&*dst, &src) {
        if old.same(new) {
            return;
        }
    }
    if let Some(p) = &src {
        p.head.as_ref().inc_strong();
    }
    if let Some(p) = dst.take() {
        p.head.as_ref().dec_strong();
    }
    *dst = src;
}

/// Allocate a node, move `value` in and adopt it into `proxy`.
pub(crate) unsafe fn allocate_into<T, A: NodePool>(
    proxy: NonNull<Proxy>,
    value: T,
    pool: A,
) -> Result<Pointee<T>, AllocError> {
    let node = NodeBox::<T, A>::allocate(pool)?;
    NodeBox::write_value(node, value);
    let head = NodeBox::head_ptr(node);
    Proxy::adopt(proxy, head);
    Ok(Pointee {
        head,
        value: NodeBox::value_ptr(node),
    })
}

/// Allocate a node and build its payload with `f`, which receives the
/// region's proxy so the payload can seed its own node handles. The node
/// sits on the region's pending-init list while `f` runs; if `f` unwinds
/// the allocation is unlinked and freed without running a payload
/// destructor.
pub(crate) unsafe fn allocate_into_with<T, A, F>(
    proxy: NonNull<Proxy>,
    f: F,
    pool: A,
) -> Result<Pointee<T>, AllocError>
where
    A: NodePool,
    F: FnOnce(&Proxy) -> T,
{
    let node = NodeBox::<T, A>::allocate(pool)?;
    let head = NodeBox::head_ptr(node);
    Proxy::enroll_pending(proxy, head);
    let guard = PendingGuard { head };
    let value = f(proxy.as_ref());
    NodeBox::write_value(node, value);
    mem::forget(guard);
    head.as_ref().init_link.unlink();
    Proxy::adopt(proxy, head);
    Ok(Pointee {
        head,
        value: NodeBox::value_ptr(node),
    })
}

struct PendingGuard {
    head: NonNull<NodeHead>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        unsafe {
            self.head.as_ref().init_link.unlink();
            (self.head.as_ref().vtable().dealloc)(self.head);
        }
    }
}

/// Allocate a `T` inside an existing region and return a handle to it.
///
/// Aborts the process on allocation failure; see [`try_make_node`] for the
/// fallible variant.
///
/// # Safety
///
/// Same contract as [`Node::new`]: the returned handle and its clones must
/// not outlive the last root anchoring the region's ring. The region must
/// not be destroying.
///
/// # Examples
///
/// ```
/// use rootrc::{make_node, Root};
///
/// let root = Root::new(1_u32);
/// let node = unsafe { make_node(&root, 2_u32) };
/// assert_eq!(*node, 2);
/// drop(node);
/// drop(root);
/// ```
pub unsafe fn make_node<T, P: HasProxy>(owner: &P, value: T) -> Node<T> {
    match try_make_node(owner, value) {
        Ok(node) => node,
        Err(AllocError) => handle_alloc_error(NodeBox::<T>::layout()),
    }
}

/// Fallible [`make_node`].
///
/// # Errors
///
/// Returns [`AllocError`] if the default pool is exhausted; the region is
/// left unchanged.
///
/// # Safety
///
/// Same contract as [`make_node`].
pub unsafe fn try_make_node<T, P: HasProxy>(owner: &P, value: T) -> Result<Node<T>, AllocError> {
    try_make_node_in(owner, value, Heap)
}

/// [`make_node`] with an injected pool.
///
/// # Safety
///
/// Same contract as [`make_node`].
pub unsafe fn make_node_in<T, P: HasProxy, A: NodePool>(owner: &P, value: T, pool: A) -> Node<T> {
    match try_make_node_in(owner, value, pool) {
        Ok(node) => node,
        Err(AllocError) => handle_alloc_error(NodeBox::<T, A>::layout()),
    }
}

/// Fallible [`make_node`] with an injected pool.
///
/// # Errors
///
/// Returns [`AllocError`] if `pool` is exhausted; the region is left
/// unchanged.
///
/// # Safety
///
/// Same contract as [`make_node`].
pub unsafe fn try_make_node_in<T, P: HasProxy, A: NodePool>(
    owner: &P,
    value: T,
    pool: A,
) -> Result<Node<T>, AllocError> {
    let proxy = NonNull::from(owner.proxy());
    let pointee = allocate_into(proxy, value, pool)?;
    Ok(Node::from_parts(Some(pointee), proxy))
}

/// Allocate a node whose payload constructor receives the region's proxy.
///
/// This is the entry point for payloads that embed node handles: `f` can
/// call [`Node::new`] or `make_node` against the proxy it is given.
///
/// # Safety
///
/// Same contract as [`make_node`].
pub unsafe fn make_node_with<T, P, F>(owner: &P, f: F) -> Node<T>
where
    P: HasProxy,
    F: FnOnce(&Proxy) -> T,
{
    match try_make_node_with_in(owner, f, Heap) {
        Ok(node) => node,
        Err(AllocError) => handle_alloc_error(NodeBox::<T>::layout()),
    }
}

/// Fallible [`make_node_with`] with an injected pool.
///
/// # Errors
///
/// Returns [`AllocError`] if `pool` is exhausted; the region is left
/// unchanged and `f` is never called.
///
/// # Safety
///
/// Same contract as [`make_node`].
pub unsafe fn try_make_node_with_in<T, P, A, F>(
    owner: &P,
    f: F,
    pool: A,
) -> Result<Node<T>, AllocError>
where
    P: HasProxy,
    A: NodePool,
    F: FnOnce(&Proxy) -> T,
{
    let proxy = NonNull::from(owner.proxy());
    let pointee = allocate_into_with(proxy, f, pool)?;
    Ok(Node::from_parts(Some(pointee), proxy))
}
