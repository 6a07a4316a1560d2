//! Core types for Rancher project management.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Brief reference to a remote object (cluster or project).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Remote identifier (e.g. "c-abc12" or "c-abc12:p-xyz34")
    pub id: String,
    /// Display name
    pub name: String,
}

impl Entity {
    /// Create a new entity reference.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Resource name to quota value, e.g. `limitsCpu: 2500m`.
///
/// Values keep the platform's unit suffixes and are never parsed.
pub type Quotas = BTreeMap<String, String>;

/// Quotas applied to a whole project and, by default, to each of its namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectQuotas {
    /// Quota for the project as a whole
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub project: Quotas,
    /// Default quota for every namespace created in the project
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub namespace: Quotas,
}

impl ProjectQuotas {
    /// Check if neither scope sets any quota.
    pub fn is_empty(&self) -> bool {
        self.project.is_empty() && self.namespace.is_empty()
    }
}

/// Kind of principal a member binding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemberType {
    /// A single user principal
    User,
    /// A directory group principal
    Group,
}

impl MemberType {
    /// Name as used in config files and the API's `subjectKind`.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberType::User => "User",
            MemberType::Group => "Group",
        }
    }
}

impl fmt::Display for MemberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role binding of a user or group to a project.
///
/// Equality and hashing only consider `(type, principal_id, role_template_id)`.
/// The `id` is assigned by Rancher and differs between otherwise identical
/// bindings, so it never takes part in comparisons.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Binding id assigned by Rancher; empty for members not created yet
    #[serde(default)]
    pub id: String,
    /// User or group
    #[serde(rename = "type")]
    pub member_type: MemberType,
    /// Principal, e.g. `openldap_group://cn=developers,ou=Groups,dc=example`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub principal_id: String,
    /// Role template, e.g. `project-member`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role_template_id: String,
}

/// Identity of a member binding for diffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberKey<'a> {
    /// User or group
    pub member_type: MemberType,
    /// Principal identifier
    pub principal_id: &'a str,
    /// Role template identifier
    pub role_template_id: &'a str,
}

impl Member {
    /// Create a member that has not been bound yet.
    pub fn new(
        member_type: MemberType,
        principal_id: impl Into<String>,
        role_template_id: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            member_type,
            principal_id: principal_id.into(),
            role_template_id: role_template_id.into(),
        }
    }

    /// Create a user member.
    pub fn user(principal_id: impl Into<String>, role_template_id: impl Into<String>) -> Self {
        Self::new(MemberType::User, principal_id, role_template_id)
    }

    /// Create a group member.
    pub fn group(principal_id: impl Into<String>, role_template_id: impl Into<String>) -> Self {
        Self::new(MemberType::Group, principal_id, role_template_id)
    }

    /// Set the binding id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Identity used for diffing.
    pub fn key(&self) -> MemberKey<'_> {
        MemberKey {
            member_type: self.member_type,
            principal_id: &self.principal_id,
            role_template_id: &self.role_template_id,
        }
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Member {}

impl Hash for Member {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.member_type, self.principal_id, self.role_template_id
        )
    }
}

/// A Rancher project: namespaces grouped under shared quotas, members and PSP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Remote id; empty means the project still has to be created
    #[serde(default)]
    pub id: String,
    /// Project name
    pub name: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Pod security policy template id
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pod_security_policy_id: String,
    /// Role bindings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Member>,
    /// Project and namespace-default quotas
    #[serde(
        rename = "projectQuotas",
        default,
        skip_serializing_if = "ProjectQuotas::is_empty"
    )]
    pub resource_quotas: ProjectQuotas,
}

impl Project {
    /// Create an empty project with a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether this project has not been created remotely yet.
    pub fn is_new(&self) -> bool {
        self.id.is_empty()
    }

    /// Scalar fields of this project.
    pub fn fields(&self) -> ProjectFields {
        ProjectFields {
            name: self.name.clone(),
            description: self.description.clone(),
            pod_security_policy_id: self.pod_security_policy_id.clone(),
        }
    }
}

/// Scalar portion of a project as stored by Rancher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectFields {
    /// Project name
    pub name: String,
    /// Description
    pub description: String,
    /// Pod security policy template id
    pub pod_security_policy_id: String,
}

/// Root of a project configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectList {
    /// Projects in file order
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl ProjectList {
    /// Create a list from projects.
    pub fn new(projects: Vec<Project>) -> Self {
        Self { projects }
    }

    /// Number of projects.
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
