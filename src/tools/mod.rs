mod tool;
pub use tool::*;

mod schema;
pub use schema::*;

mod registry;
pub use registry::*;

mod result;
pub use result::*;

mod browser;
pub use browser::*;

mod error;
pub use error::*;
