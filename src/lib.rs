#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]
#![doc(html_root_url = "https://docs.rs/rootrc/0.1.0")]

//! Deterministic region-based smart pointers.
//!
//! `rootrc` manages arbitrary object graphs — cycles included — without a
//! tracing collector and without leaking. Objects live in *regions*: a
//! [`Root`] handle creates a region and anchors it from the stack, and
//! every allocation made through that root (the [`make_node`] family) is
//! adopted into the region. [`Node`] handles stored inside payloads can
//! reference further nodes; assigning a handle across regions *unifies*
//! the regions into a single ring that is destroyed as one unit.
//!
//! When the last root anchoring a ring goes out of scope, every node of
//! the ring is destroyed promptly and in registration order, whether or
//! not the nodes reference each other. An individual release that brings a
//! node's count to zero never frees the node; reclamation is always the
//! bulk, iterative teardown of the ring. That is what makes a cycle of
//! strong references safe here:
//!
//! ```
//! use core::cell::RefCell;
//! use core::sync::atomic::{AtomicUsize, Ordering};
//! use rootrc::{Node, Root};
//!
//! static DROPS: AtomicUsize = AtomicUsize::new(0);
//!
//! struct Cycle {
//!     next: RefCell<Option<Node<Cycle>>>,
//! }
//!
//! impl Drop for Cycle {
//!     fn drop(&mut self) {
//!         DROPS.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let root = Root::new_with(|proxy| Cycle {
//!     // a handle living inside the payload, bound to the same region
//!     next: RefCell::new(Some(unsafe { Node::new(proxy) })),
//! });
//! // close the loop: the payload now points back at its own node
//! root.get().unwrap().next.borrow_mut().as_mut().unwrap().assign_root(&root);
//!
//! drop(root);
//! assert_eq!(DROPS.load(Ordering::SeqCst), 1);
//! ```
//!
//! # Handles
//!
//! - [`Root<T>`] is stack-anchored and safe: holding one keeps its whole
//!   ring alive. Dropping the last root of a ring is the sole trigger of
//!   reclamation.
//! - [`Node<T>`] lives inside payloads and never anchors anything. Its
//!   constructors are `unsafe` because a node handle must not outlive the
//!   region it belongs to; the type system cannot see that tie.
//!
//! # Single-threaded
//!
//! All core types are `!Send` and `!Sync`. A region and its handles belong
//! to one thread for their whole lifetime.
//!
//! # Features
//!
//! - `std` (default): implements [`std::error::Error`] for the crate's
//!   error types. Disable for `no_std` + `alloc` builds.

extern crate alloc;
#[cfg(any(feature = "std", test))]
extern crate std;

#[macro_use]
extern crate log;

#[cfg(debug_assertions)]
mod hash;
mod link;
mod node;
mod pool;
mod proxy;
mod ptr;
mod root;
pub mod value;

pub use node::{
    make_node, make_node_in, make_node_with, try_make_node, try_make_node_in,
    try_make_node_with_in, Node,
};
pub use pool::{AllocError, Heap, NodePool};
pub use proxy::{HasProxy, Proxy};
pub use root::{make_root, Root};
