#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! A linear chain of 1000 nodes built with node handles. Teardown must be
//! iterative (no stack overflow) and destructors must fire in insertion
//! order.

use rootrc::{make_node, Node, Root};
use std::cell::RefCell;

thread_local! {
    static ORDER: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

const CHAIN_LEN: usize = 1000;

struct ChainLink {
    id: usize,
    next: RefCell<Option<Node<ChainLink>>>,
}

impl ChainLink {
    fn new(id: usize) -> Self {
        Self {
            id,
            next: RefCell::new(None),
        }
    }
}

impl Drop for ChainLink {
    fn drop(&mut self) {
        ORDER.with(|order| order.borrow_mut().push(self.id));
    }
}

#[test]
fn drop_chain_in_order() {
    let _ = env_logger::Builder::from_env("ROOTRC_LOG").try_init();

    let root = Root::new(ChainLink::new(0));
    let mut last: Option<Node<ChainLink>> = None;
    for id in 1..CHAIN_LEN {
        let node = unsafe { make_node(&root, ChainLink::new(id)) };
        match &last {
            None => *root.get().unwrap().next.borrow_mut() = Some(node.clone()),
            Some(prev) => *prev.get().unwrap().next.borrow_mut() = Some(node.clone()),
        }
        last = Some(node);
    }
    drop(last);

    ORDER.with(|order| assert!(order.borrow().is_empty()));
    drop(root);

    ORDER.with(|order| {
        let order = order.borrow();
        assert_eq!(order.len(), CHAIN_LEN);
        assert!(order.iter().copied().eq(0..CHAIN_LEN));
    });
}
