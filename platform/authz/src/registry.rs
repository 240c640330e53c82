use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use crate::{
    Action, AuthzError, AuthzResult, Condition, ResourceKind, Role, Rule, Target,
};

static STANDARD: Lazy<Registry> = Lazy::new(|| {
    use Action::*;
    use ResourceKind::*;

    Registry::builder()
        .baseline(
            Rule::allow(&[Update, Delete], &[Organization]).when(Condition::OwnedBySubject),
        )
        .role(
            Role::Admin,
            [
                Rule::allow(&[Manage], &[Target::All]),
                Rule::allow(&[TransferOwnership], &[Organization])
                    .when(Condition::OwnedBySubject),
                Rule::deny(&[Update, TransferOwnership], &[Organization])
                    .when(Condition::NotOwnedBySubject),
            ],
        )
        .role(
            Role::Member,
            [
                Rule::allow(&[Get], &[User]),
                Rule::allow(&[Create, Get], &[Project]),
                Rule::allow(&[Update, Delete], &[Project]).when(Condition::OwnedBySubject),
            ],
        )
        .role(
            Role::Billing,
            [
                Rule::allow(&[Get, Update], &[Billing]),
                Rule::deny(&[Update, Delete], &[Organization, Project]),
            ],
        )
        .build()
});

/// Immutable role → rules table.
///
/// Rules for a role are the shared baseline followed by the role's own rules,
/// both in declaration order.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    baseline: Vec<Rule>,
    roles: BTreeMap<Role, Vec<Rule>>,
}

impl Registry {
    /// The table every request handler evaluates against.
    pub fn standard() -> &'static Registry {
        &STANDARD
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn rules_for(&self, role: Role) -> AuthzResult<impl Iterator<Item = &Rule> + '_> {
        let own = self
            .roles
            .get(&role)
            .ok_or(AuthzError::UnregisteredRole(role))?;
        Ok(self.baseline.iter().chain(own.iter()))
    }

    pub fn baseline(&self) -> &[Rule] {
        &self.baseline
    }

    /// The role's own rules, without the baseline.
    pub fn role_rules(&self, role: Role) -> Option<&[Rule]> {
        self.roles.get(&role).map(Vec::as_slice)
    }

    pub fn is_registered(&self, role: Role) -> bool {
        self.roles.contains_key(&role)
    }

    /// Fails on the first role of the closed set that has no rules declared.
    pub fn validate(&self) -> AuthzResult<()> {
        match Role::ALL.into_iter().find(|role| !self.is_registered(*role)) {
            Some(role) => Err(AuthzError::UnregisteredRole(role)),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    pub fn baseline(mut self, rule: Rule) -> Self {
        self.registry.baseline.push(rule);
        self
    }

    /// Appends rules for `role`; calling it twice for a role extends the list.
    pub fn role(mut self, role: Role, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.registry.roles.entry(role).or_default().extend(rules);
        self
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Effect;

    #[test]
    fn standard_table_registers_every_role() {
        let registry = Registry::standard();
        assert!(registry.validate().is_ok());
        for role in Role::ALL {
            assert!(registry.rules_for(role).unwrap().count() > registry.baseline().len());
        }
    }

    #[test]
    fn baseline_precedes_role_rules() {
        let registry = Registry::standard();
        let rules = registry.rules_for(Role::Billing).unwrap().collect::<Vec<_>>();
        assert_eq!(rules[0], &registry.baseline()[0]);
        assert_eq!(rules.last().unwrap().effect(), Effect::Deny);
    }

    #[test]
    fn missing_role_is_a_configuration_error() {
        let registry = Registry::builder()
            .role(Role::Admin, [Rule::allow(&[Action::Manage], &[Target::All])])
            .build();
        assert!(registry.rules_for(Role::Admin).is_ok());
        assert!(matches!(
            registry.rules_for(Role::Member),
            Err(AuthzError::UnregisteredRole(Role::Member))
        ));
        assert_eq!(
            registry.validate(),
            Err(AuthzError::UnregisteredRole(Role::Member))
        );
    }
}
