use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::AuthzError;

/// Verbs a subject can request against a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Wildcard on the rule side: a `manage` grant covers every action.
    Manage,
    Get,
    Create,
    Update,
    Delete,
    TransferOwnership,
    Export,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Manage,
        Action::Get,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::TransferOwnership,
        Action::Export,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Manage => "manage",
            Action::Get => "get",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::TransferOwnership => "transfer_ownership",
            Action::Export => "export",
        }
    }

    /// Whether a rule declaring `self` applies to a request for `requested`.
    pub fn covers(self, requested: Action) -> bool {
        self == Action::Manage || self == requested
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| AuthzError::UnknownAction(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manage_covers_every_action() {
        for action in Action::ALL {
            assert!(Action::Manage.covers(action));
        }
        assert!(!Action::Get.covers(Action::Manage));
        assert!(!Action::Update.covers(Action::Delete));
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!(
            "transfer_ownership".parse::<Action>().unwrap(),
            Action::TransferOwnership
        );
        assert_eq!(
            "Delete".parse::<Action>(),
            Err(AuthzError::UnknownAction("Delete".into()))
        );
    }
}
