use authz_tests::{resources_owned_by, vocabulary};
use platform_authz::{
    Action, Permissions, Reason, Registry, Resource, ResourceInstance, ResourceKind, Role, Rule,
    Subject, get_user_permissions,
};
use uuid::Uuid;

#[test]
fn roles_without_rules_are_denied_everything() {
    for role in Role::ALL {
        let registry = Registry::builder().role(role, Vec::<Rule>::new()).build();
        let subject = Subject::new(Uuid::new_v4(), role);
        let permissions = Permissions::new(&registry, subject);
        for resource in resources_owned_by(subject.id) {
            for &action in resource.kind().actions() {
                let decision = permissions.decide(action, &resource).unwrap();
                assert!(!decision.is_allowed(), "{role} {action} {resource}");
                assert_eq!(decision.reason, Reason::NoMatchingRule);
            }
        }
    }
}

#[test]
fn undeclared_pairs_fail_closed_in_the_standard_table() {
    let member = get_user_permissions(Uuid::new_v4(), Role::Member);
    for &action in ResourceKind::Invite.actions() {
        assert!(member.cannot(action, ResourceKind::Invite).unwrap());
    }
    let billing = get_user_permissions(Uuid::new_v4(), Role::Billing);
    for kind in [ResourceKind::User, ResourceKind::Invite] {
        for &action in kind.actions() {
            assert!(billing.cannot(action, kind).unwrap(), "BILLING {action} {kind}");
        }
    }
}

#[test]
fn admin_inherits_every_type_level_grant() {
    let admin = get_user_permissions(Uuid::new_v4(), Role::Admin);
    for (action, kind) in vocabulary() {
        assert!(admin.can(action, kind).unwrap(), "ADMIN {action} {kind}");
    }
}

#[test]
fn can_and_cannot_are_exact_negations() {
    for role in Role::ALL {
        let subject_id = Uuid::new_v4();
        let permissions = get_user_permissions(subject_id, role);
        let mut resources = resources_owned_by(subject_id);
        resources.extend(resources_owned_by(Uuid::new_v4()));
        for resource in &resources {
            for &action in resource.kind().actions() {
                let can = permissions.can(action, resource.clone()).unwrap();
                let cannot = permissions.cannot(action, resource.clone()).unwrap();
                assert_eq!(can, !cannot, "{role} {action} {resource}");
            }
        }
    }
}

#[test]
fn rebuilt_permissions_decide_identically() {
    let subject_id = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    for role in Role::ALL {
        let first = get_user_permissions(subject_id, role);
        let second = get_user_permissions(subject_id, role);
        for resource in resources_owned_by(subject_id)
            .into_iter()
            .chain(resources_owned_by(stranger))
        {
            for &action in resource.kind().actions() {
                assert_eq!(
                    first.decide(action, &resource).unwrap(),
                    second.decide(action, &resource).unwrap()
                );
            }
        }
    }
}

#[test]
fn decisions_do_not_leak_between_subjects() {
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let project: Resource = ResourceInstance::project(Uuid::new_v4(), alice).into();

    let as_alice = get_user_permissions(alice, Role::Member);
    let as_bob = get_user_permissions(bob, Role::Member);
    assert!(as_alice.can(Action::Update, project.clone()).unwrap());
    assert!(as_bob.cannot(Action::Update, project.clone()).unwrap());
    assert!(as_alice.can(Action::Update, project).unwrap());
}
