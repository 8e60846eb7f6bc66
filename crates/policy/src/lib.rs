//! Capability registry and enforcement engine.
//!
//! Core principle: **no operation body runs unless its wiring says so.**
//!
//! Each plugin describes itself with a [`Manifest`]: the operations it
//! exposes, the capability interfaces it depends on, and for every operation
//! a [`WiringEntry`] holding one [`Gate`] per [`CallPath`]. Gates reference
//! predicates indirectly through [`FunctionReference`], so a plugin can say
//! "validate with function 0 of my first dependency" without knowing which
//! module will be installed there.
//!
//! At call time [`authorize`] resolves those references against the
//! dependency table the host passes in and returns a [`Decision`].

mod capability;
mod engine;
mod error;
mod manifest;

pub use capability::{Address, CapabilityProvider, FunctionId, FunctionReference, Selector};
pub use engine::{AuthorizationRequest, Decision, DenyReason, authorize};
pub use error::{Error, Result};
pub use manifest::{CallPath, DependencyInterface, Gate, Manifest, OperationDescriptor, WiringEntry};
