// ── Device classes ──
//
// Class files, inheritance, compilation into readers, and the
// identification tree.

mod compile;
pub mod definition;
pub mod loader;
pub mod merge;
mod tree;

pub use loader::{ClassSource, builtin, load_dir};
pub use tree::{ClassTree, ComponentReaders, DeviceClass, ROOT_CLASS};
