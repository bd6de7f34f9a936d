mod circuit_breaker;
pub use circuit_breaker::*;

mod error_boundary;
pub use error_boundary::*;
