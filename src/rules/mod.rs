// Reusable rules for resource pipelines

pub mod existence;
pub mod list;
pub mod permission;
pub mod uniqueness;
pub mod validation;

pub use existence::{Loaded, NoDependents, RecordExists, ReferenceExists, ReferencesExist};
pub use list::{ListQuery, ListRequest, Page, ValidateListQuery};
pub use permission::{Authorize, Policy};
pub use uniqueness::Unique;
pub use validation::{nullable, FieldErrors, Validate, ValidateInput};
