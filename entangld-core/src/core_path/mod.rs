/*
    core_path - the local namespace

    Dotted paths, the leaf values stored at them, and the prefix tree holding both.
    Nothing here knows about peers or subscriptions.
*/

pub mod leaf;
pub mod path;
pub mod tree;

pub use leaf::{GetterError, GetterResult, Leaf};
pub use path::{Path, PathError, SEPARATOR};
pub use tree::{Lookup, PathStore};
