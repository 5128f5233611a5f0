// Rule → execution pipeline shared by every resource operation

pub mod context;
pub mod error;
pub mod pipeline;
pub mod traits;

pub use context::ExecutionContext;
pub use error::{FieldError, RuleError};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use traits::{FnRule, Rule};
