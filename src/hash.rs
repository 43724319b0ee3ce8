use core::hash::BuildHasherDefault;

use rustc_hash::FxHasher;

pub(crate) type HashSet<T> = hashbrown::HashSet<T, BuildHasherDefault<FxHasher>>;
