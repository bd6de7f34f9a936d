mod workflow;
pub use workflow::*;

mod step;
pub use step::*;

mod wait;
pub use wait::*;

mod execution;
pub use execution::*;

mod step_result;
pub use step_result::*;
