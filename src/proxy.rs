//! Region proxies.
//!
//! A [`Proxy`] coordinates a dynamic equivalence class of nodes. It owns a
//! FIFO list of member nodes and sits in a circular ring of proxies that
//! have been merged by cross-region assignment. The ring is the unit of
//! destruction: when the last anchored proxy of a ring loses its final
//! anchor, every member of every proxy in the ring is destroyed in
//! registration order, cycles included, and the ring itself is freed.

use core::cell::Cell;
use core::mem::offset_of;
use core::ptr::NonNull;

use alloc::boxed::Box;

use crate::link::{Link, List};
use crate::ptr::NodeHead;

/// The bookkeeping object that owns a region of nodes.
///
/// Proxies are created by [`Root`] handles and live on the heap for as long
/// as their ring does. User code never constructs one directly; it receives
/// `&Proxy` through [`HasProxy`] and passes it to the `make_node` family to
/// place allocations inside an existing region.
///
/// [`Root`]: crate::Root
pub struct Proxy {
    ring: Link,
    members: List,
    pending: List,
    anchors: Cell<usize>,
    destroying: Cell<bool>,
}

impl Proxy {
    /// Allocate a fresh proxy: singleton ring, empty member list, one
    /// anchor claimed by the creating root.
    pub(crate) fn create() -> NonNull<Proxy> {
        let proxy = Box::new(Proxy {
            ring: Link::dangling(),
            members: List::new(),
            pending: List::new(),
            anchors: Cell::new(1),
            destroying: Cell::new(false),
        });
        let this = NonNull::from(Box::leak(proxy));
        unsafe {
            Link::init(NonNull::from(&this.as_ref().ring));
            this.as_ref().members.init();
            this.as_ref().pending.init();
        }
        trace!("rootrc created proxy {this:p}");
        this
    }

    /// Whether the ring this proxy belongs to is currently running its
    /// members' destructors.
    ///
    /// Payload destructors can use this to tell an ordinary release from a
    /// bulk teardown, mirroring what the handles do internally.
    #[must_use]
    pub fn is_destroying(&self) -> bool {
        self.destroying.get()
    }

    /// Number of proxies in this proxy's ring.
    #[must_use]
    pub fn ring_size(&self) -> usize {
        let this = NonNull::from(self);
        let mut count = 1;
        let mut cur = unsafe { Self::ring_next(this) };
        while cur != this {
            count += 1;
            cur = unsafe { Self::ring_next(cur) };
        }
        count
    }

    unsafe fn from_ring(link: NonNull<Link>) -> NonNull<Proxy> {
        let raw = link.as_ptr().cast::<u8>().sub(offset_of!(Proxy, ring));
        NonNull::new_unchecked(raw.cast())
    }

    unsafe fn ring_next(this: NonNull<Proxy>) -> NonNull<Proxy> {
        Self::from_ring(this.as_ref().ring.next())
    }

    /// Whether `this` and `other` already share a ring. Bounded walk over
    /// the ring, O(proxies in ring).
    pub(crate) unsafe fn same_ring(this: NonNull<Proxy>, other: NonNull<Proxy>) -> bool {
        let mut cur = this;
        loop {
            if cur == other {
                return true;
            }
            cur = Self::ring_next(cur);
            if cur == this {
                return false;
            }
        }
    }

    /// Merge `other`'s ring into `this`'s ring. Idempotent; O(1) splice
    /// after the membership probe.
    ///
    /// # Safety
    ///
    /// Both pointers must be live proxies, and neither ring may be
    /// destroying.
    pub(crate) unsafe fn unify(this: NonNull<Proxy>, other: NonNull<Proxy>) {
        if Self::same_ring(this, other) {
            return;
        }
        debug_assert!(
            !this.as_ref().destroying.get() && !other.as_ref().destroying.get(),
            "attempted to unify a region that is being destroyed"
        );
        Link::splice(&this.as_ref().ring, &other.as_ref().ring);
        trace!("rootrc unified proxy {this:p} with proxy {other:p}");
        #[cfg(debug_assertions)]
        Self::debug_check_ring(this);
    }

    /// Enlist a freshly allocated node as a member of this region.
    ///
    /// # Safety
    ///
    /// `node` must be a live, initialized node that has never been adopted,
    /// and the ring must not be destroying.
    pub(crate) unsafe fn adopt(this: NonNull<Proxy>, node: NonNull<NodeHead>) {
        debug_assert!(
            !this.as_ref().destroying.get(),
            "attempted to adopt a node into a region that is being destroyed"
        );
        debug_assert!(node.as_ref().owner().is_none(), "node adopted twice");
        this.as_ref()
            .members
            .push_back(NonNull::from(&node.as_ref().region_link));
        node.as_ref().set_owner(this);
        trace!("rootrc proxy {this:p} adopted node {node:p}");
    }

    /// Park an allocated-but-uninitialized node on the pending list until
    /// its payload constructor finishes.
    ///
    /// # Safety
    ///
    /// `node` must be live and on no list.
    pub(crate) unsafe fn enroll_pending(this: NonNull<Proxy>, node: NonNull<NodeHead>) {
        this.as_ref()
            .pending
            .push_back(NonNull::from(&node.as_ref().init_link));
    }

    pub(crate) fn anchor_inc(&self) {
        if self.anchors.get() == usize::MAX {
            crate::ptr::abort();
        }
        self.anchors.set(self.anchors.get() + 1);
    }

    /// Release one anchor. When the proxy's last anchor goes and no other
    /// proxy in the ring is anchored, the whole ring is destroyed; when
    /// another proxy still holds an anchor, this proxy hands its members to
    /// the ring successor and stays in the ring, empty, until the ring is
    /// reclaimed. No destructors run on a handoff.
    ///
    /// # Safety
    ///
    /// `this` must be a live proxy with at least one anchor. If teardown
    /// triggers, every proxy in the ring is deallocated before this
    /// function returns.
    pub(crate) unsafe fn anchor_dec(this: NonNull<Proxy>) {
        let proxy = this.as_ref();
        debug_assert!(proxy.anchors.get() > 0);
        proxy.anchors.set(proxy.anchors.get() - 1);
        if proxy.anchors.get() > 0 {
            return;
        }
        if Self::ring_anchored(this) {
            let next = Self::ring_next(this);
            debug!("rootrc proxy {this:p} unanchored, members handed to {next:p}");
            next.as_ref().members.append(&proxy.members);
            next.as_ref().pending.append(&proxy.pending);
        } else {
            Self::destroy_ring(this);
        }
    }

    unsafe fn ring_anchored(this: NonNull<Proxy>) -> bool {
        let mut cur = this;
        loop {
            if cur.as_ref().anchors.get() > 0 {
                return true;
            }
            cur = Self::ring_next(cur);
            if cur == this {
                return false;
            }
        }
    }

    /// Destroy every member of every proxy in the ring, then free the
    /// proxies themselves.
    ///
    /// Destruction order is the contract: insertion order within a proxy,
    /// ring-traversal order across proxies starting at `start`. The
    /// `destroying` flag is raised on the whole ring first, so handle
    /// operations inside payload destructors observe it and leave the
    /// reference counts alone.
    unsafe fn destroy_ring(start: NonNull<Proxy>) {
        debug!("rootrc destroying region ring at {start:p}");
        let mut cur = start;
        loop {
            cur.as_ref().destroying.set(true);
            cur = Self::ring_next(cur);
            if cur == start {
                break;
            }
        }

        cur = start;
        loop {
            let proxy = cur.as_ref();
            while let Some(link) = proxy.members.first() {
                let node = NodeHead::from_region_link(link);
                link.as_ref().unlink();
                let vtable = node.as_ref().vtable();
                trace!("rootrc destroying node {node:p}");
                (vtable.destroy)(node);
                (vtable.dealloc)(node);
            }
            // Pending nodes never saw their payload constructor finish;
            // they are freed without running a destructor.
            while let Some(link) = proxy.pending.first() {
                let node = NodeHead::from_init_link(link);
                link.as_ref().unlink();
                let vtable = node.as_ref().vtable();
                (vtable.destroy)(node);
                (vtable.dealloc)(node);
            }
            cur = Self::ring_next(cur);
            if cur == start {
                break;
            }
        }

        let mut cur = Self::ring_next(start);
        while cur != start {
            let next = Self::ring_next(cur);
            trace!("rootrc freeing proxy {cur:p}");
            drop(Box::from_raw(cur.as_ptr()));
            cur = next;
        }
        trace!("rootrc freeing proxy {start:p}");
        drop(Box::from_raw(start.as_ptr()));
    }

    #[cfg(debug_assertions)]
    unsafe fn debug_check_ring(start: NonNull<Proxy>) {
        use crate::hash::HashSet;

        let mut seen = HashSet::default();
        let mut cur = start;
        loop {
            assert!(
                seen.insert(cur.as_ptr() as usize),
                "proxy ring contains a duplicate entry"
            );
            let next = Self::ring_next(cur);
            assert_eq!(
                next.as_ref().ring.prev(),
                NonNull::from(&cur.as_ref().ring),
                "proxy ring links are inconsistent"
            );
            cur = next;
            if cur == start {
                break;
            }
        }
    }
}

/// Projection from a value to the region proxy it belongs to.
///
/// Implemented by [`Proxy`] itself and by both handle types. Payload types
/// that embed node handles can implement it by delegating to one of their
/// fields, which lets nested `make_node` calls discover their containing
/// region:
///
/// ```
/// use rootrc::{HasProxy, Node, Proxy};
///
/// struct Cell {
///     next: Node<Cell>,
/// }
///
/// impl HasProxy for Cell {
///     fn proxy(&self) -> &Proxy {
///         self.next.proxy()
///     }
/// }
/// ```
pub trait HasProxy {
    /// Borrow the proxy of the region this value belongs to.
    fn proxy(&self) -> &Proxy;
}

impl HasProxy for Proxy {
    fn proxy(&self) -> &Proxy {
        self
    }
}
