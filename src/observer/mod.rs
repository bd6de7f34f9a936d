mod event;
pub use event::*;

#[allow(clippy::module_inception)]
mod observer;
pub use observer::*;
