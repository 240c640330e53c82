use serde::Serialize;
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    Action, AuthzError, AuthzResult, Effect, Registry, Resource, ResourceKind, Role, Rule,
    Specificity, Subject,
};

/// Why a decision came out the way it did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reason {
    /// Position of the deciding rule in the role's ordered rule list.
    Rule {
        index: usize,
        specificity: Specificity,
    },
    NoMatchingRule,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub effect: Effect,
    pub reason: Reason,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.effect == Effect::Allow
    }
}

/// Decision surface for one subject in one organization.
///
/// Holds only the subject snapshot and a shared reference to the registry, so
/// building one per request is free and nothing leaks between requests.
#[derive(Clone, Copy, Debug)]
pub struct Permissions<'r> {
    registry: &'r Registry,
    subject: Subject,
}

/// Permissions for `subject_id` acting as `role`, evaluated against the
/// standard rule table.
pub fn get_user_permissions(subject_id: Uuid, role: Role) -> Permissions<'static> {
    Permissions::new(Registry::standard(), Subject::new(subject_id, role))
}

impl<'r> Permissions<'r> {
    pub fn new(registry: &'r Registry, subject: Subject) -> Self {
        Self { registry, subject }
    }

    pub fn subject(&self) -> Subject {
        self.subject
    }

    pub fn can(&self, action: Action, resource: impl Into<Resource>) -> AuthzResult<bool> {
        self.decide(action, &resource.into())
            .map(|decision| decision.is_allowed())
    }

    pub fn cannot(&self, action: Action, resource: impl Into<Resource>) -> AuthzResult<bool> {
        self.can(action, resource).map(|allowed| !allowed)
    }

    /// Like [`can`](Self::can) but reports a refusal as [`AuthzError::Denied`].
    pub fn authorize(&self, action: Action, resource: impl Into<Resource>) -> AuthzResult<()> {
        let resource = resource.into();
        if self.decide(action, &resource)?.is_allowed() {
            Ok(())
        } else {
            Err(AuthzError::Denied {
                role: self.subject.role,
                action,
                resource: resource.kind(),
            })
        }
    }

    /// Evaluates the role's rules once, in order.
    ///
    /// Any matching deny refuses the request regardless of specificity or
    /// position. Otherwise any matching allow grants it. No match refuses.
    /// The reported rule is the most specific match of the winning effect,
    /// the later one on ties.
    pub fn decide(&self, action: Action, resource: &Resource) -> AuthzResult<Decision> {
        let kind = resource.kind();
        if !kind.supports(action) {
            return Err(AuthzError::UnsupportedAction { action, kind });
        }

        let rules = self.registry.rules_for(self.subject.role).inspect_err(|err| {
            error!(role = %self.subject.role, error = %err, "authorization rules missing for role");
        })?;

        let mut best_allow: Option<(usize, Specificity)> = None;
        let mut best_deny: Option<(usize, Specificity)> = None;
        for (index, rule) in rules.enumerate() {
            let Some(specificity) = rule.matches(self.subject.id, action, resource)? else {
                continue;
            };
            let best = match rule.effect() {
                Effect::Allow => &mut best_allow,
                Effect::Deny => &mut best_deny,
            };
            if best.is_none_or(|(_, current)| specificity >= current) {
                *best = Some((index, specificity));
            }
        }

        let decision = match (best_deny, best_allow) {
            (Some((index, specificity)), _) => Decision {
                effect: Effect::Deny,
                reason: Reason::Rule { index, specificity },
            },
            (None, Some((index, specificity))) => Decision {
                effect: Effect::Allow,
                reason: Reason::Rule { index, specificity },
            },
            (None, None) => Decision {
                effect: Effect::Deny,
                reason: Reason::NoMatchingRule,
            },
        };
        debug!(
            subject = %self.subject.id,
            role = %self.subject.role,
            %action,
            %resource,
            allowed = decision.is_allowed(),
            reason = ?decision.reason,
            "authorization decision"
        );
        Ok(decision)
    }

    /// Every `(action, kind)` pair the subject holds at type level.
    pub fn granted(&self) -> AuthzResult<Vec<(Action, ResourceKind)>> {
        let mut granted = Vec::new();
        for kind in ResourceKind::ALL {
            for &action in kind.actions() {
                if self.can(action, kind)? {
                    granted.push((action, kind));
                }
            }
        }
        Ok(granted)
    }

    /// The rule a decision points at, for diagnostics.
    pub fn rule_at(&self, index: usize) -> AuthzResult<Option<&'r Rule>> {
        Ok(self.registry.rules_for(self.subject.role)?.nth(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Condition, ResourceInstance, Target};

    fn member() -> Permissions<'static> {
        get_user_permissions(Uuid::new_v4(), Role::Member)
    }

    #[test]
    fn member_can_create_and_list_projects() {
        let permissions = member();
        assert!(permissions.can(Action::Create, ResourceKind::Project).unwrap());
        assert!(permissions.can(Action::Get, ResourceKind::Project).unwrap());
        assert!(permissions.cannot(Action::Create, ResourceKind::Invite).unwrap());
    }

    #[test]
    fn member_owns_only_their_projects() {
        let permissions = member();
        let own = ResourceInstance::project(Uuid::new_v4(), permissions.subject().id);
        let foreign = ResourceInstance::project(Uuid::new_v4(), Uuid::new_v4());

        let decision = permissions
            .decide(Action::Delete, &own.clone().into())
            .unwrap();
        assert!(decision.is_allowed());
        assert!(matches!(
            decision.reason,
            Reason::Rule {
                specificity: Specificity::Instance,
                ..
            }
        ));
        assert!(permissions.can(Action::Update, own).unwrap());
        assert!(permissions.cannot(Action::Delete, foreign.clone()).unwrap());
        assert!(permissions.cannot(Action::Update, foreign).unwrap());
    }

    #[test]
    fn no_matching_rule_fails_closed() {
        let permissions = member();
        let decision = permissions
            .decide(Action::Export, &ResourceKind::Billing.into())
            .unwrap();
        assert_eq!(
            decision,
            Decision {
                effect: Effect::Deny,
                reason: Reason::NoMatchingRule,
            }
        );
    }

    #[test]
    fn deny_outranks_more_specific_allow() {
        let registry = Registry::builder()
            .role(
                Role::Member,
                [
                    Rule::deny(&[Action::Delete], &[ResourceKind::Project]),
                    Rule::allow(&[Action::Delete], &[ResourceKind::Project])
                        .when(Condition::OwnedBySubject),
                ],
            )
            .build();
        let subject = Subject::new(Uuid::new_v4(), Role::Member);
        let permissions = Permissions::new(&registry, subject);
        let own = ResourceInstance::project(Uuid::new_v4(), subject.id);
        let decision = permissions.decide(Action::Delete, &own.into()).unwrap();
        assert_eq!(
            decision,
            Decision {
                effect: Effect::Deny,
                reason: Reason::Rule {
                    index: 0,
                    specificity: Specificity::Type,
                },
            }
        );
    }

    #[test]
    fn later_rule_reports_on_equal_specificity() {
        let registry = Registry::builder()
            .role(
                Role::Member,
                [
                    Rule::allow(&[Action::Get], &[Target::All]),
                    Rule::allow(&[Action::Get], &[ResourceKind::User]),
                ],
            )
            .build();
        let permissions = Permissions::new(&registry, Subject::new(Uuid::new_v4(), Role::Member));
        let decision = permissions
            .decide(Action::Get, &ResourceKind::User.into())
            .unwrap();
        assert_eq!(
            decision.reason,
            Reason::Rule {
                index: 1,
                specificity: Specificity::Type,
            }
        );
        assert_eq!(
            permissions.rule_at(1).unwrap(),
            Some(&Rule::allow(&[Action::Get], &[ResourceKind::User]))
        );
    }

    #[test]
    fn authorize_reports_denial_as_error() {
        let permissions = member();
        assert_eq!(
            permissions.authorize(Action::Create, ResourceKind::Invite),
            Err(AuthzError::Denied {
                role: Role::Member,
                action: Action::Create,
                resource: ResourceKind::Invite,
            })
        );
        assert!(permissions.authorize(Action::Get, ResourceKind::User).is_ok());
    }

    #[test]
    fn unregistered_role_cannot_be_evaluated() {
        let registry = Registry::builder().build();
        let permissions = Permissions::new(&registry, Subject::new(Uuid::new_v4(), Role::Admin));
        assert_eq!(
            permissions.can(Action::Get, ResourceKind::Project),
            Err(AuthzError::UnregisteredRole(Role::Admin))
        );
    }

    #[test]
    fn action_outside_kind_vocabulary_is_rejected() {
        let permissions = get_user_permissions(Uuid::new_v4(), Role::Admin);
        assert_eq!(
            permissions.can(Action::Export, ResourceKind::Project),
            Err(AuthzError::UnsupportedAction {
                action: Action::Export,
                kind: ResourceKind::Project,
            })
        );
    }

    #[test]
    fn member_grants_are_listed_at_type_level() {
        let granted = member().granted().unwrap();
        assert_eq!(
            granted,
            vec![
                (Action::Update, ResourceKind::Organization),
                (Action::Delete, ResourceKind::Organization),
                (Action::Get, ResourceKind::Project),
                (Action::Create, ResourceKind::Project),
                (Action::Update, ResourceKind::Project),
                (Action::Delete, ResourceKind::Project),
                (Action::Get, ResourceKind::User),
            ]
        );
    }
}
