//! Module manifests: exposed operations, dependencies and authorization wiring.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{CapabilityProvider, Error, FunctionReference, Result, Selector};

/// How a call reached the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPath {
    /// An authenticated request routed through the account's own execution.
    UserOperation,
    /// A raw external call.
    Runtime,
}

impl std::fmt::Display for CallPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserOperation => f.write_str("user_operation"),
            Self::Runtime => f.write_str("runtime"),
        }
    }
}

/// One externally invocable function of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub selector: Selector,
    pub signature: String,
    pub module: String,
}

impl OperationDescriptor {
    pub fn new(module: impl Into<String>, signature: impl Into<String>) -> Self {
        let signature = signature.into();
        Self {
            selector: Selector::from_signature(&signature),
            signature,
            module: module.into(),
        }
    }
}

/// A capability interface a module requires another installed module to supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyInterface {
    pub interface: String,
}

/// Checks guarding one operation on one call path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    /// At least one must pass. Empty means nobody may call.
    #[serde(default)]
    pub validators: Vec<FunctionReference>,

    /// All must pass, evaluated in order.
    #[serde(default)]
    pub hooks: Vec<FunctionReference>,
}

impl Gate {
    pub fn validated_by(validator: FunctionReference) -> Self {
        Self {
            validators: vec![validator],
            hooks: Vec::new(),
        }
    }

    /// A gate no caller passes.
    pub fn closed() -> Self {
        Self::default()
    }

    pub fn with_hook(mut self, hook: FunctionReference) -> Self {
        self.hooks.push(hook);
        self
    }
}

/// Authorization wiring for one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringEntry {
    pub selector: Selector,
    pub user_operation: Gate,
    pub runtime: Gate,
}

impl WiringEntry {
    pub fn gate(&self, path: CallPath) -> &Gate {
        match path {
            CallPath::UserOperation => &self.user_operation,
            CallPath::Runtime => &self.runtime,
        }
    }
}

/// Immutable declaration of a module's operations, dependencies and wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub dependencies: Vec<DependencyInterface>,
    #[serde(default)]
    pub operations: Vec<OperationDescriptor>,
    #[serde(default)]
    pub wiring: Vec<WiringEntry>,
}

impl Manifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            operations: Vec::new(),
            wiring: Vec::new(),
        }
    }

    pub fn depends_on(mut self, interface: impl Into<String>) -> Self {
        self.dependencies.push(DependencyInterface {
            interface: interface.into(),
        });
        self
    }

    /// Expose `signature` and wire it with one gate per call path.
    pub fn operation(mut self, signature: &str, user_operation: Gate, runtime: Gate) -> Self {
        let descriptor = OperationDescriptor::new(self.name.clone(), signature);
        self.wiring.push(WiringEntry {
            selector: descriptor.selector,
            user_operation,
            runtime,
        });
        self.operations.push(descriptor);
        self
    }

    pub fn wiring_for(&self, selector: Selector) -> Option<&WiringEntry> {
        self.wiring.iter().find(|entry| entry.selector == selector)
    }

    pub fn selectors(&self) -> impl Iterator<Item = Selector> + '_ {
        self.operations.iter().map(|op| op.selector)
    }

    /// Check the wiring against the dependencies it will be installed with.
    ///
    /// `own` is the declaring module; `dependencies[i]` satisfies
    /// `self.dependencies[i]`.
    pub fn validate(
        &self,
        own: &dyn CapabilityProvider,
        dependencies: &[&dyn CapabilityProvider],
    ) -> Result<()> {
        if dependencies.len() != self.dependencies.len() {
            return Err(self.config_error(format!(
                "declares {} dependencies but {} were supplied",
                self.dependencies.len(),
                dependencies.len()
            )));
        }

        for (index, (declared, provider)) in
            self.dependencies.iter().zip(dependencies).enumerate()
        {
            if provider.interface() != declared.interface {
                return Err(self.config_error(format!(
                    "dependency {index} must provide '{}', got '{}'",
                    declared.interface,
                    provider.interface()
                )));
            }
        }

        let mut exposed = HashSet::new();
        for op in &self.operations {
            if !exposed.insert(op.selector) {
                return Err(self.config_error(format!("operation {} declared twice", op.signature)));
            }
        }

        let mut wired = HashSet::new();
        for entry in &self.wiring {
            if !exposed.contains(&entry.selector) {
                return Err(self.config_error(format!(
                    "wiring for {} has no operation descriptor",
                    entry.selector
                )));
            }
            if !wired.insert(entry.selector) {
                return Err(self.config_error(format!("{} wired twice", entry.selector)));
            }
            for gate in [&entry.user_operation, &entry.runtime] {
                for reference in &gate.validators {
                    if *reference == FunctionReference::AlwaysDeny {
                        return Err(self.config_error(format!(
                            "{}: always_deny is not a validator",
                            entry.selector
                        )));
                    }
                    self.check_reference(reference, own, dependencies)?;
                }
                for reference in &gate.hooks {
                    if *reference == FunctionReference::AlwaysAllow {
                        return Err(self.config_error(format!(
                            "{}: always_allow is not a hook",
                            entry.selector
                        )));
                    }
                    self.check_reference(reference, own, dependencies)?;
                }
            }
        }

        if let Some(op) = self.operations.iter().find(|op| !wired.contains(&op.selector)) {
            return Err(self.config_error(format!("operation {} has no wiring", op.signature)));
        }

        Ok(())
    }

    fn check_reference(
        &self,
        reference: &FunctionReference,
        own: &dyn CapabilityProvider,
        dependencies: &[&dyn CapabilityProvider],
    ) -> Result<()> {
        match *reference {
            FunctionReference::Own { function } if !own.exposes(function) => Err(
                self.config_error(format!("own function {function} is not implemented")),
            ),
            FunctionReference::Dependency { index, function } => {
                let provider = dependencies.get(usize::from(index)).ok_or_else(|| {
                    self.config_error(format!("dependency index {index} is not bound"))
                })?;
                if provider.exposes(function) {
                    Ok(())
                } else {
                    Err(self.config_error(format!(
                        "dependency {index} ('{}') does not expose {function}",
                        provider.interface()
                    )))
                }
            }
            _ => Ok(()),
        }
    }

    fn config_error(&self, message: String) -> Error {
        Error::Configuration(format!("{}: {message}", self.name))
    }
}
