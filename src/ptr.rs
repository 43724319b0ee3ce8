//! Per-allocation node headers.
//!
//! Every managed allocation is a [`NodeBox`]: a [`NodeHead`] control block
//! followed by the payload and a copy of the pool that produced the memory.
//! The header carries the strong count, the two intrusive links (region
//! membership and pending initialization) and a back-pointer to the owning
//! proxy. Payload destruction and deallocation are reached through a
//! per-type vtable so a proxy can tear down a heterogeneous member list.

use core::alloc::Layout;
use core::cell::Cell;
use core::mem::{offset_of, MaybeUninit};
use core::ptr::{self, NonNull};

use crate::link::Link;
use crate::pool::{AllocError, Heap, NodePool};
use crate::proxy::Proxy;

#[cfg(feature = "std")]
pub(crate) fn abort() -> ! {
    std::process::abort()
}

#[cfg(not(feature = "std"))]
pub(crate) fn abort() -> ! {
    // A panic while panicking aborts without unwinding.
    struct Abort;
    impl Drop for Abort {
        fn drop(&mut self) {
            panic!("fatal");
        }
    }
    let _abort = Abort;
    panic!("fatal")
}

pub(crate) struct NodeVTable {
    /// Run the payload destructor in place. Idempotent.
    pub(crate) destroy: unsafe fn(NonNull<NodeHead>),
    /// Return the allocation to the pool it came from. The payload must
    /// already be destroyed (or never initialized).
    pub(crate) dealloc: unsafe fn(NonNull<NodeHead>),
}

/// Type-erased control block at the front of every node allocation.
///
/// `region_link` is the first field so a member-list cursor recovers the
/// header with a pointer cast; `init_link` is recovered by offset.
#[repr(C)]
pub(crate) struct NodeHead {
    pub(crate) region_link: Link,
    pub(crate) init_link: Link,
    strong: Cell<usize>,
    owner: Cell<Option<NonNull<Proxy>>>,
    uninit: Cell<bool>,
    vtable: &'static NodeVTable,
}

impl NodeHead {
    /// # Safety
    ///
    /// `link` must be the `region_link` of a live `NodeHead`.
    pub(crate) unsafe fn from_region_link(link: NonNull<Link>) -> NonNull<NodeHead> {
        link.cast()
    }

    /// # Safety
    ///
    /// `link` must be the `init_link` of a live `NodeHead`.
    pub(crate) unsafe fn from_init_link(link: NonNull<Link>) -> NonNull<NodeHead> {
        let raw = link
            .as_ptr()
            .cast::<u8>()
            .sub(offset_of!(NodeHead, init_link));
        NonNull::new_unchecked(raw.cast())
    }

    #[inline]
    pub(crate) fn strong(&self) -> usize {
        self.strong.get()
    }

    #[inline]
    pub(crate) fn inc_strong(&self) {
        // A count of zero means every handle is gone; there is nothing
        // left to clone from.
        if self.strong() == 0 || self.strong() == usize::MAX {
            abort();
        }
        self.strong.set(self.strong() + 1);
    }

    #[inline]
    pub(crate) fn dec_strong(&self) {
        debug_assert!(self.strong() > 0);
        self.strong.set(self.strong() - 1);
    }

    #[inline]
    pub(crate) fn is_uninit(&self) -> bool {
        self.uninit.get()
    }

    #[inline]
    pub(crate) fn make_uninit(&self) {
        self.uninit.set(true);
    }

    #[inline]
    pub(crate) fn owner(&self) -> Option<NonNull<Proxy>> {
        self.owner.get()
    }

    #[inline]
    pub(crate) fn set_owner(&self, proxy: NonNull<Proxy>) {
        self.owner.set(Some(proxy));
    }

    #[inline]
    pub(crate) fn vtable(&self) -> &'static NodeVTable {
        self.vtable
    }
}

/// A node allocation: header, payload and the pool that produced it.
#[repr(C)]
pub(crate) struct NodeBox<T, A: NodePool = Heap> {
    head: NodeHead,
    value: MaybeUninit<T>,
    pool: A,
}

impl<T, A: NodePool> NodeBox<T, A> {
    const VTABLE: NodeVTable = NodeVTable {
        destroy: Self::destroy,
        dealloc: Self::dealloc,
    };

    pub(crate) fn layout() -> Layout {
        Layout::new::<Self>()
    }

    /// Allocate a node with an uninitialized payload and a strong count of
    /// one. The links are singleton rings; the node is not yet enrolled
    /// anywhere.
    pub(crate) fn allocate(pool: A) -> Result<NonNull<Self>, AllocError> {
        let raw = pool.allocate(Self::layout())?.cast::<Self>();
        unsafe {
            raw.as_ptr().write(NodeBox {
                head: NodeHead {
                    region_link: Link::dangling(),
                    init_link: Link::dangling(),
                    strong: Cell::new(1),
                    owner: Cell::new(None),
                    uninit: Cell::new(true),
                    vtable: &Self::VTABLE,
                },
                value: MaybeUninit::uninit(),
                pool,
            });
            Link::init(NonNull::from(&raw.as_ref().head.region_link));
            Link::init(NonNull::from(&raw.as_ref().head.init_link));
        }
        Ok(raw)
    }

    pub(crate) fn head_ptr(this: NonNull<Self>) -> NonNull<NodeHead> {
        this.cast()
    }

    /// # Safety
    ///
    /// `this` must be a live allocation whose payload has been written.
    pub(crate) unsafe fn value_ptr(this: NonNull<Self>) -> NonNull<T> {
        NonNull::new_unchecked(ptr::addr_of_mut!((*this.as_ptr()).value).cast::<T>())
    }

    /// Move `value` into the payload slot.
    ///
    /// # Safety
    ///
    /// `this` must be a live allocation whose payload is uninitialized.
    pub(crate) unsafe fn write_value(this: NonNull<Self>, value: T) {
        debug_assert!(this.as_ref().head.is_uninit());
        ptr::addr_of_mut!((*this.as_ptr()).value)
            .cast::<T>()
            .write(value);
        this.as_ref().head.uninit.set(false);
    }

    unsafe fn destroy(head: NonNull<NodeHead>) {
        let this = head.cast::<Self>();
        if !head.as_ref().is_uninit() {
            // Flip the flag before running the destructor so a reentrant
            // destroy of this node is a no-op.
            head.as_ref().make_uninit();
            ptr::drop_in_place(ptr::addr_of_mut!((*this.as_ptr()).value).cast::<T>());
        }
    }

    unsafe fn dealloc(head: NonNull<NodeHead>) {
        let this = head.cast::<Self>();
        let pool = ptr::read(ptr::addr_of!((*this.as_ptr()).pool));
        pool.deallocate(head.cast::<u8>(), Self::layout());
    }
}

/// The (header, payload) pointer pair carried by a non-empty handle.
pub(crate) struct Pointee<T> {
    pub(crate) head: NonNull<NodeHead>,
    pub(crate) value: NonNull<T>,
}

impl<T> Clone for Pointee<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Pointee<T> {}

impl<T> Pointee<T> {
    #[inline]
    pub(crate) fn same(&self, other: &Self) -> bool {
        self.head == other.head
    }
}
