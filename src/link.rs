//! Intrusive circular doubly-linked lists.
//!
//! `Link` is a tag embedded in a larger structure. Linked into a ring it
//! groups objects together without any side allocation, which is what makes
//! bulk teardown of a region O(1) per node. `List` adds a sentinel head for
//! FIFO member lists.

use core::cell::Cell;
use core::ptr::NonNull;

pub(crate) struct Link {
    next: Cell<NonNull<Link>>,
    prev: Cell<NonNull<Link>>,
}

impl Link {
    /// A link with unusable pointers. `init` must be called once the link
    /// has its final address.
    pub(crate) fn dangling() -> Self {
        Self {
            next: Cell::new(NonNull::dangling()),
            prev: Cell::new(NonNull::dangling()),
        }
    }

    /// Make `this` a singleton ring.
    ///
    /// # Safety
    ///
    /// `this` must point to a live `Link` that is not a member of any ring.
    pub(crate) unsafe fn init(this: NonNull<Link>) {
        this.as_ref().next.set(this);
        this.as_ref().prev.set(this);
    }

    #[inline]
    pub(crate) fn next(&self) -> NonNull<Link> {
        self.next.get()
    }

    #[cfg(debug_assertions)]
    #[inline]
    pub(crate) fn prev(&self) -> NonNull<Link> {
        self.prev.get()
    }

    /// Insert `node` into this ring, immediately before `self`.
    ///
    /// # Safety
    ///
    /// `self` must be a member of a well-formed ring and `node` must be a
    /// live singleton link.
    pub(crate) unsafe fn insert_before(&self, node: NonNull<Link>) {
        let this = NonNull::from(self);
        let prev = self.prev.get();
        node.as_ref().next.set(this);
        node.as_ref().prev.set(prev);
        prev.as_ref().next.set(node);
        self.prev.set(node);
    }

    /// Remove `self` from its ring, leaving it a singleton.
    ///
    /// # Safety
    ///
    /// `self` must be a member of a well-formed ring. Unlinking a singleton
    /// is a no-op.
    pub(crate) unsafe fn unlink(&self) {
        let this = NonNull::from(self);
        let next = self.next.get();
        let prev = self.prev.get();
        prev.as_ref().next.set(next);
        next.as_ref().prev.set(prev);
        self.next.set(this);
        self.prev.set(this);
    }

    /// Merge the ring containing `b` into the ring containing `a` by
    /// swapping their predecessor links. O(1).
    ///
    /// # Safety
    ///
    /// `a` and `b` must be members of two well-formed, *disjoint* rings.
    /// Splicing two members of the same ring splits it instead.
    pub(crate) unsafe fn splice(a: &Link, b: &Link) {
        let ap = a.prev.get();
        let bp = b.prev.get();
        a.prev.set(bp);
        bp.as_ref().next.set(NonNull::from(a));
        b.prev.set(ap);
        ap.as_ref().next.set(NonNull::from(b));
    }
}

/// A FIFO list built from a sentinel `Link`.
pub(crate) struct List {
    head: Link,
}

impl List {
    pub(crate) fn new() -> Self {
        Self {
            head: Link::dangling(),
        }
    }

    /// # Safety
    ///
    /// The list must have its final address and must not have been
    /// initialized before.
    pub(crate) unsafe fn init(&self) {
        Link::init(NonNull::from(&self.head));
    }

    fn sentinel(&self) -> NonNull<Link> {
        NonNull::from(&self.head)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.next() == self.sentinel()
    }

    /// First element, or `None` when the list is empty.
    pub(crate) fn first(&self) -> Option<NonNull<Link>> {
        let first = self.head.next();
        if first == self.sentinel() {
            None
        } else {
            Some(first)
        }
    }

    /// Append `node` at the tail.
    ///
    /// # Safety
    ///
    /// The list must be initialized and `node` must be a live singleton
    /// link.
    pub(crate) unsafe fn push_back(&self, node: NonNull<Link>) {
        self.head.insert_before(node);
    }

    /// Move every element of `other` to the tail of `self`, preserving
    /// `other`'s order. `other` is left empty.
    ///
    /// # Safety
    ///
    /// Both lists must be initialized and distinct.
    pub(crate) unsafe fn append(&self, other: &List) {
        if other.is_empty() {
            return;
        }
        let first = other.head.next.get();
        let last = other.head.prev.get();
        let tail = self.head.prev.get();
        tail.as_ref().next.set(first);
        first.as_ref().prev.set(tail);
        last.as_ref().next.set(self.sentinel());
        self.head.prev.set(last);
        Link::init(other.sentinel());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use alloc::vec::Vec;

    fn collect(list: &List) -> Vec<NonNull<Link>> {
        let mut out = Vec::new();
        let mut cur = list.head.next();
        while cur != NonNull::from(&list.head) {
            out.push(cur);
            cur = unsafe { cur.as_ref().next() };
        }
        out
    }

    fn new_list() -> Box<List> {
        let list = Box::new(List::new());
        unsafe { list.init() };
        list
    }

    fn new_link() -> Box<Link> {
        let link = Box::new(Link::dangling());
        unsafe { Link::init(NonNull::from(&*link)) };
        link
    }

    #[test]
    fn push_back_is_fifo() {
        let list = new_list();
        let links = [new_link(), new_link(), new_link()];
        for link in &links {
            unsafe { list.push_back(NonNull::from(&**link)) };
        }
        let order = collect(&list);
        assert_eq!(order.len(), 3);
        for (got, link) in order.iter().zip(links.iter()) {
            assert_eq!(*got, NonNull::from(&**link));
        }
    }

    #[test]
    fn unlink_removes_single_element() {
        let list = new_list();
        let a = new_link();
        let b = new_link();
        unsafe {
            list.push_back(NonNull::from(&*a));
            list.push_back(NonNull::from(&*b));
            a.unlink();
        }
        let order = collect(&list);
        assert_eq!(order, [NonNull::from(&*b)]);
        assert!(!list.is_empty());
        unsafe { b.unlink() };
        assert!(list.is_empty());
    }

    #[test]
    fn append_preserves_order_and_clears_source() {
        let left = new_list();
        let right = new_list();
        let links = [new_link(), new_link(), new_link(), new_link()];
        unsafe {
            left.push_back(NonNull::from(&*links[0]));
            left.push_back(NonNull::from(&*links[1]));
            right.push_back(NonNull::from(&*links[2]));
            right.push_back(NonNull::from(&*links[3]));
            left.append(&right);
        }
        assert!(right.is_empty());
        let order = collect(&left);
        assert_eq!(order.len(), 4);
        for (got, link) in order.iter().zip(links.iter()) {
            assert_eq!(*got, NonNull::from(&**link));
        }
    }

    #[test]
    fn append_empty_is_noop() {
        let left = new_list();
        let right = new_list();
        let a = new_link();
        unsafe {
            left.push_back(NonNull::from(&*a));
            left.append(&right);
        }
        assert_eq!(collect(&left), [NonNull::from(&*a)]);
    }

    #[test]
    fn splice_merges_two_rings() {
        let a = new_link();
        let b = new_link();
        unsafe { Link::splice(&a, &b) };
        assert_eq!(a.next(), NonNull::from(&*b));
        assert_eq!(b.next(), NonNull::from(&*a));

        let c = new_link();
        let d = new_link();
        unsafe {
            Link::splice(&c, &d);
            // merge {a, b} into {c, d}
            Link::splice(&a, &c);
        }
        // all four reachable from `a`
        let mut seen = 1;
        let mut cur = a.next();
        while cur != NonNull::from(&*a) {
            seen += 1;
            cur = unsafe { cur.as_ref().next() };
        }
        assert_eq!(seen, 4);
    }
}
