use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{Action, AuthzError, AuthzResult};

/// Protected entity categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum ResourceKind {
    Organization,
    Project,
    User,
    Invite,
    Billing,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Organization,
        ResourceKind::Project,
        ResourceKind::User,
        ResourceKind::Invite,
        ResourceKind::Billing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Organization => "Organization",
            ResourceKind::Project => "Project",
            ResourceKind::User => "User",
            ResourceKind::Invite => "Invite",
            ResourceKind::Billing => "Billing",
        }
    }

    /// Actions that are meaningful for this kind.
    pub fn actions(self) -> &'static [Action] {
        use Action::*;
        match self {
            ResourceKind::Organization => &[Manage, Get, Update, Delete, TransferOwnership],
            ResourceKind::Project => &[Manage, Get, Create, Update, Delete],
            ResourceKind::User => &[Manage, Get, Update, Delete],
            ResourceKind::Invite => &[Manage, Get, Create, Delete],
            ResourceKind::Billing => &[Manage, Get, Update, Export],
        }
    }

    pub fn supports(self, action: Action) -> bool {
        self.actions().contains(&action)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| AuthzError::UnknownResource(value.to_string()))
    }
}

/// A concrete entity handed to the evaluator for ownership-aware checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceInstance {
    kind: ResourceKind,
    id: Uuid,
    owner_id: Option<Uuid>,
}

impl ResourceInstance {
    pub fn new(kind: ResourceKind, id: Uuid) -> Self {
        Self {
            kind,
            id,
            owner_id: None,
        }
    }

    pub fn organization(id: Uuid, owner_id: Uuid) -> Self {
        Self::new(ResourceKind::Organization, id).with_owner(owner_id)
    }

    pub fn project(id: Uuid, owner_id: Uuid) -> Self {
        Self::new(ResourceKind::Project, id).with_owner(owner_id)
    }

    pub fn with_owner(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner_id(&self) -> Option<Uuid> {
        self.owner_id
    }

    /// Shape-check an untyped instance payload.
    ///
    /// Expects `{"__typename": "<Kind>", "id": "<uuid>", "ownerId": "<uuid>"}`;
    /// `ownerId` may be absent or null for kinds that carry no owner.
    pub fn from_json(value: &Value) -> AuthzResult<Self> {
        let Value::Object(fields) = value else {
            return Err(AuthzError::invalid("resource", "expected an object"));
        };
        let kind = match fields.get("__typename") {
            Some(Value::String(name)) => name.parse::<ResourceKind>()?,
            Some(_) => return Err(AuthzError::invalid("resource", "`__typename` must be a string")),
            None => return Err(AuthzError::invalid("resource", "missing `__typename`")),
        };
        let id = match fields.get("id") {
            Some(raw) => parse_uuid(kind, "id", raw)?,
            None => return Err(AuthzError::invalid(kind.as_str(), "missing `id`")),
        };
        let owner_id = match fields.get("ownerId") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(parse_uuid(kind, "ownerId", raw)?),
        };
        Ok(Self { kind, id, owner_id })
    }
}

fn parse_uuid(kind: ResourceKind, field: &str, raw: &Value) -> AuthzResult<Uuid> {
    let text = raw
        .as_str()
        .ok_or_else(|| AuthzError::invalid(kind.as_str(), format!("`{field}` must be a string")))?;
    Uuid::parse_str(text)
        .map_err(|_| AuthzError::invalid(kind.as_str(), format!("`{field}` is not a uuid")))
}

/// What a check is made against: a bare kind when no instance is at hand, or
/// an instance when ownership matters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resource {
    Type(ResourceKind),
    Instance(ResourceInstance),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Type(kind) => *kind,
            Resource::Instance(instance) => instance.kind(),
        }
    }

    /// Accepts either a bare type tag (`"Project"`) or an instance object.
    pub fn from_json(value: &Value) -> AuthzResult<Self> {
        match value {
            Value::String(name) => Ok(Resource::Type(name.parse()?)),
            Value::Object(_) => ResourceInstance::from_json(value).map(Resource::Instance),
            _ => Err(AuthzError::invalid(
                "resource",
                "expected a type name or an instance object",
            )),
        }
    }
}

impl From<ResourceKind> for Resource {
    fn from(kind: ResourceKind) -> Self {
        Resource::Type(kind)
    }
}

impl From<ResourceInstance> for Resource {
    fn from(instance: ResourceInstance) -> Self {
        Resource::Instance(instance)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Type(kind) => write!(f, "{kind}"),
            Resource::Instance(instance) => write!(f, "{}({})", instance.kind, instance.id),
        }
    }
}
