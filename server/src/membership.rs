use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use async_trait::async_trait;
use platform_api::ApiError;
use platform_authz::{ResourceInstance, Role};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("organization `{0}` not found")]
    OrganizationNotFound(String),
    #[error("you're not a member of this organization")]
    NotMember,
}

impl From<MembershipError> for ApiError {
    fn from(value: MembershipError) -> Self {
        match value {
            MembershipError::OrganizationNotFound(_) => ApiError::NotFound(value.to_string()),
            MembershipError::NotMember => ApiError::Forbidden(value.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRef {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub owner_id: Uuid,
}

impl OrganizationRef {
    pub fn as_resource(&self) -> ResourceInstance {
        ResourceInstance::organization(self.id, self.owner_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Membership {
    pub organization: OrganizationRef,
    pub role: Role,
}

/// Resolves the role a user holds within an organization.
#[async_trait]
pub trait MembershipLookup: Send + Sync {
    async fn membership(&self, slug: &str, user_id: Uuid) -> Result<Membership, MembershipError>;
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    organizations: Vec<OrganizationRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrganizationRecord {
    id: Uuid,
    slug: String,
    name: String,
    owner_id: Uuid,
    #[serde(default)]
    members: Vec<MemberRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberRecord {
    user_id: Uuid,
    role: Role,
}

#[derive(Debug)]
struct DirectoryEntry {
    organization: OrganizationRef,
    members: HashMap<Uuid, Role>,
}

/// Read-only membership directory held in memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    organizations: HashMap<String, DirectoryEntry>,
}

impl InMemoryDirectory {
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: DirectoryFile =
            serde_json::from_str(raw).context("invalid membership directory")?;
        let mut organizations = HashMap::new();
        for record in file.organizations {
            let members = record
                .members
                .into_iter()
                .map(|member| (member.user_id, member.role))
                .collect();
            let organization = OrganizationRef {
                id: record.id,
                slug: record.slug,
                name: record.name,
                owner_id: record.owner_id,
            };
            if organizations.contains_key(&organization.slug) {
                anyhow::bail!("duplicate organization slug `{}`", organization.slug);
            }
            organizations.insert(
                organization.slug.clone(),
                DirectoryEntry {
                    organization,
                    members,
                },
            );
        }
        Ok(Self { organizations })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("failed to load {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.organizations.len()
    }
}

#[async_trait]
impl MembershipLookup for InMemoryDirectory {
    async fn membership(&self, slug: &str, user_id: Uuid) -> Result<Membership, MembershipError> {
        let entry = self
            .organizations
            .get(slug)
            .ok_or_else(|| MembershipError::OrganizationNotFound(slug.to_string()))?;
        let role = entry
            .members
            .get(&user_id)
            .copied()
            .ok_or(MembershipError::NotMember)?;
        Ok(Membership {
            organization: entry.organization.clone(),
            role,
        })
    }
}
