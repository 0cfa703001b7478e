//! Trellis Process
//!
//! Static process metadata and the seams the engine consumes it through:
//!
//! - [`ProcessDescriptor`] - identifier, typed input/output parameters and an
//!   optional embedded workflow graph for composite "model" processes
//! - [`validate_inputs`] - submit-time cardinality/default resolution
//! - [`ProcessLoader`] - pluggable source of descriptors and synchronous
//!   process invocation, called from worker threads
//! - [`ProcessRegistry`] - the set of known processes, with synchronous
//!   add/remove listener notification

mod descriptor;
mod error;
mod loader;
mod registry;
mod validate;

pub use descriptor::{
  ParameterDescriptor, ParameterType, ProcessDescriptor, ProcessInputs, ProcessOutputs,
};
pub use error::{InvokeError, ProcessError};
pub use loader::{InvokeContext, ProcessLoader, StaticLoader};
pub use registry::{ProcessRegistry, RegistryListener};
pub use validate::validate_inputs;
