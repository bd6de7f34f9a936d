mod entry;
pub use entry::*;

mod pool;
pub use pool::*;
