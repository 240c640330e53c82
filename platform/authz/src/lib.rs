//! Authorization engine for organization-scoped resources.
//!
//! A [`Registry`] maps each [`Role`] to an ordered list of allow/deny
//! [`Rule`]s, some of them conditional on ownership of the resource instance.
//! Request handlers resolve the caller's role in the target organization,
//! build a [`Permissions`] value with [`get_user_permissions`] and ask it
//! whether an [`Action`] on a [`Resource`] is allowed. The engine does no I/O
//! and keeps no per-request state.

mod action;
mod error;
mod evaluator;
mod registry;
mod resource;
mod role;
mod rule;

pub use action::Action;
pub use error::{AuthzError, AuthzResult, ErrorClass};
pub use evaluator::{Decision, Permissions, Reason, get_user_permissions};
pub use registry::{Registry, RegistryBuilder};
pub use resource::{Resource, ResourceInstance, ResourceKind};
pub use role::{Role, Subject};
pub use rule::{Condition, Effect, Rule, Specificity, Target};
