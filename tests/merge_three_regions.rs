#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! Three regions of three nodes each, merged into one ring by cross-region
//! assignment. Dropping the roots that were assigned *into* destroys
//! nothing; dropping the last root destroys all nine nodes, grouped by
//! region of origin and in insertion order within each region.

use rootrc::{make_node, HasProxy, Node, Root};
use std::cell::RefCell;

thread_local! {
    static ORDER: RefCell<Vec<(&'static str, usize)>> = const { RefCell::new(Vec::new()) };
}

struct Tagged {
    region: &'static str,
    seq: usize,
    x: RefCell<Option<Node<Tagged>>>,
}

impl Tagged {
    fn new(region: &'static str, seq: usize) -> Self {
        Self {
            region,
            seq,
            x: RefCell::new(None),
        }
    }
}

impl Drop for Tagged {
    fn drop(&mut self) {
        ORDER.with(|order| order.borrow_mut().push((self.region, self.seq)));
    }
}

fn build_region(region: &'static str) -> Root<Tagged> {
    let root = Root::new(Tagged::new(region, 1));
    for seq in 2..=3 {
        // handles dropped right away; the nodes stay members of the region
        // and are reclaimed with it
        let _ = unsafe { make_node(&root, Tagged::new(region, seq)) };
    }
    root
}

#[test]
fn merge_three_regions() {
    let _ = env_logger::Builder::from_env("ROOTRC_LOG").try_init();

    let ra = build_region("A");
    let rb = build_region("B");
    let rc = build_region("C");

    // ra.x = rb
    let mut ab: Node<Tagged> = unsafe { Node::new(ra.proxy()) };
    ab.assign_root(&rb);
    *ra.get().unwrap().x.borrow_mut() = Some(ab);
    assert_eq!(ra.proxy().ring_size(), 2);

    // rb.x = rc
    let mut bc: Node<Tagged> = unsafe { Node::new(rb.proxy()) };
    bc.assign_root(&rc);
    *rb.get().unwrap().x.borrow_mut() = Some(bc);
    assert_eq!(ra.proxy().ring_size(), 3);
    assert_eq!(rc.proxy().ring_size(), 3);

    drop(rc);
    ORDER.with(|order| assert!(order.borrow().is_empty()));
    drop(rb);
    ORDER.with(|order| assert!(order.borrow().is_empty()));

    drop(ra);
    ORDER.with(|order| {
        let order = order.borrow();
        let expected = [
            ("A", 1),
            ("A", 2),
            ("A", 3),
            ("B", 1),
            ("B", 2),
            ("B", 3),
            ("C", 1),
            ("C", 2),
            ("C", 3),
        ];
        assert_eq!(*order, expected);
    });
}
