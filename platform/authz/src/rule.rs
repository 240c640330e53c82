use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::{Action, AuthzError, AuthzResult, Resource, ResourceInstance, ResourceKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Effect {
    Allow,
    Deny,
}

/// Which resource kinds a rule applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    All,
    Kind(ResourceKind),
}

impl Target {
    pub fn covers(self, kind: ResourceKind) -> bool {
        match self {
            Target::All => true,
            Target::Kind(target) => target == kind,
        }
    }
}

impl From<ResourceKind> for Target {
    fn from(kind: ResourceKind) -> Self {
        Target::Kind(kind)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::All => f.write_str("all"),
            Target::Kind(kind) => write!(f, "{kind}"),
        }
    }
}

/// Instance predicates a rule can be restricted by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    OwnedBySubject,
    NotOwnedBySubject,
}

impl Condition {
    pub fn holds(self, subject_id: Uuid, instance: &ResourceInstance) -> AuthzResult<bool> {
        let owner_id = instance.owner_id().ok_or(AuthzError::MissingField {
            kind: instance.kind(),
            field: "ownerId",
        })?;
        Ok(match self {
            Condition::OwnedBySubject => owner_id == subject_id,
            Condition::NotOwnedBySubject => owner_id != subject_id,
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::OwnedBySubject => f.write_str("ownerId == subject"),
            Condition::NotOwnedBySubject => f.write_str("ownerId != subject"),
        }
    }
}

/// How precisely a rule matched. Instance matches outrank type matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Specificity {
    Type,
    Instance,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    effect: Effect,
    actions: Vec<Action>,
    targets: Vec<Target>,
    condition: Option<Condition>,
}

impl Rule {
    pub fn allow<T: Into<Target> + Copy>(actions: &[Action], targets: &[T]) -> Self {
        Self::new(Effect::Allow, actions, targets)
    }

    pub fn deny<T: Into<Target> + Copy>(actions: &[Action], targets: &[T]) -> Self {
        Self::new(Effect::Deny, actions, targets)
    }

    fn new<T: Into<Target> + Copy>(effect: Effect, actions: &[Action], targets: &[T]) -> Self {
        Self {
            effect,
            actions: actions.to_vec(),
            targets: targets.iter().map(|target| (*target).into()).collect(),
            condition: None,
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn condition(&self) -> Option<Condition> {
        self.condition
    }

    /// Returns how the rule matched, or `None` when it does not apply.
    ///
    /// Against a bare kind a conditional allow still applies (some instance
    /// may satisfy it) while a conditional deny does not.
    pub fn matches(
        &self,
        subject_id: Uuid,
        action: Action,
        resource: &Resource,
    ) -> AuthzResult<Option<Specificity>> {
        let kind = resource.kind();
        if !self.actions.iter().any(|declared| declared.covers(action))
            || !self.targets.iter().any(|target| target.covers(kind))
        {
            return Ok(None);
        }

        let Some(condition) = self.condition else {
            return Ok(Some(Specificity::Type));
        };
        match resource {
            Resource::Type(_) => Ok((self.effect == Effect::Allow).then_some(Specificity::Type)),
            Resource::Instance(instance) => Ok(condition
                .holds(subject_id, instance)?
                .then_some(Specificity::Instance)),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let effect = match self.effect {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        };
        let actions = self
            .actions
            .iter()
            .map(|action| action.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let targets = self
            .targets
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{effect} [{actions}] on [{targets}]")?;
        if let Some(condition) = self.condition {
            write!(f, " when {condition}")?;
        }
        Ok(())
    }
}
