#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! A region holding a single node whose payload references itself through a
//! node handle: one construction, one destruction, no leak and no
//! double-free.

use rootrc::{Node, Root};
use std::cell::{Cell, RefCell};

thread_local! {
    static CONSTRUCTED: Cell<usize> = const { Cell::new(0) };
    static DESTROYED: Cell<usize> = const { Cell::new(0) };
}

struct SelfRef {
    next: RefCell<Option<Node<SelfRef>>>,
}

impl SelfRef {
    fn new(next: Option<Node<SelfRef>>) -> Self {
        CONSTRUCTED.with(|c| c.set(c.get() + 1));
        Self {
            next: RefCell::new(next),
        }
    }
}

impl Drop for SelfRef {
    fn drop(&mut self) {
        DESTROYED.with(|c| c.set(c.get() + 1));
    }
}

#[test]
fn drop_self_cycle() {
    let _ = env_logger::Builder::from_env("ROOTRC_LOG").try_init();

    let root = Root::new_with(|proxy| SelfRef::new(Some(unsafe { Node::new(proxy) })));
    assert_eq!(Root::strong_count(&root), 1);

    // root.next = root
    root.get()
        .unwrap()
        .next
        .borrow_mut()
        .as_mut()
        .unwrap()
        .assign_root(&root);
    assert_eq!(Root::strong_count(&root), 2);

    drop(root);

    assert_eq!(CONSTRUCTED.with(Cell::get), 1);
    assert_eq!(DESTROYED.with(Cell::get), 1);
}
