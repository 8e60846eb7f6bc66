//! Call-time resolution and enforcement of manifest wiring.

use serde::{Deserialize, Serialize};

use crate::{
    Address, CallPath, CapabilityProvider, Error, FunctionReference, Manifest, Result, Selector,
};

/// Why a call was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NoSuchOperation,
    Unauthorized,
    HookRejected,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSuchOperation => f.write_str("no such operation"),
            Self::Unauthorized => f.write_str("caller is not authorized"),
            Self::HookRejected => f.write_str("rejected by pre-execution hook"),
        }
    }
}

/// Result of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// The call being authorized.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationRequest<'a> {
    pub selector: Selector,
    pub caller: &'a Address,
    pub path: CallPath,
}

/// Decide whether `request` may run the operation body.
///
/// `own` supplies the manifest's own functions and `dependencies[i]` is the
/// module currently installed at dependency ordinal `i`. The decision is a
/// pure function of its inputs and must be recomputed for every call.
///
/// Returns `Err` only for wiring that does not resolve, which is a
/// configuration defect rather than a decision about the caller.
pub fn authorize(
    manifest: &Manifest,
    own: &dyn CapabilityProvider,
    request: AuthorizationRequest<'_>,
    dependencies: &[&dyn CapabilityProvider],
) -> Result<Decision> {
    let Some(entry) = manifest.wiring_for(request.selector) else {
        return Ok(Decision::Deny(DenyReason::NoSuchOperation));
    };
    let gate = entry.gate(request.path);

    let mut authorized = false;
    for reference in &gate.validators {
        if evaluate(manifest, reference, own, request.caller, dependencies)? {
            authorized = true;
            break;
        }
    }
    if !authorized {
        tracing::warn!(
            module = %manifest.name,
            selector = %request.selector,
            caller = %request.caller,
            path = %request.path,
            validators = gate.validators.len(),
            "no authorization validator passed"
        );
        return Ok(Decision::Deny(DenyReason::Unauthorized));
    }

    for reference in &gate.hooks {
        if !evaluate(manifest, reference, own, request.caller, dependencies)? {
            tracing::warn!(
                module = %manifest.name,
                selector = %request.selector,
                caller = %request.caller,
                hook = %reference,
                "pre-execution hook rejected call"
            );
            return Ok(Decision::Deny(DenyReason::HookRejected));
        }
    }

    tracing::debug!(
        module = %manifest.name,
        selector = %request.selector,
        caller = %request.caller,
        "call authorized"
    );
    Ok(Decision::Allow)
}

fn evaluate(
    manifest: &Manifest,
    reference: &FunctionReference,
    own: &dyn CapabilityProvider,
    caller: &Address,
    dependencies: &[&dyn CapabilityProvider],
) -> Result<bool> {
    match *reference {
        FunctionReference::AlwaysAllow => Ok(true),
        FunctionReference::AlwaysDeny => Ok(false),
        FunctionReference::Own { function } => Ok(own.is_authorized(function, caller)),
        FunctionReference::Dependency { index, function } => {
            let provider = dependencies.get(usize::from(index)).ok_or_else(|| {
                Error::Configuration(format!(
                    "{}: dependency index {index} is not bound",
                    manifest.name
                ))
            })?;
            if !provider.exposes(function) {
                return Err(Error::Configuration(format!(
                    "{}: dependency {index} ('{}') does not expose {function}",
                    manifest.name,
                    provider.interface()
                )));
            }
            Ok(provider.is_authorized(function, caller))
        }
    }
}
