//! Tool catalog: declarative descriptors, argument validation and the
//! built-in Azure AI Search handlers.

mod registry;
mod schema;
pub mod search;
mod testing;
mod traits;

pub use registry::{RegistryError, RegistryResult, ToolDefinition, ToolDescriptor, ToolRegistry};
pub use schema::{ParamSpec, ParamType, ToolArguments, input_schema, validate};
pub use traits::{ToolError, ToolHandler, ToolResult};

#[cfg(test)]
pub(crate) use testing::helpers;
