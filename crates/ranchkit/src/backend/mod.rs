//! Remote entity store abstraction.
//!
//! The [`Backend`] trait is everything the reconciliation engine needs from
//! Rancher. [`rancher::RancherBackend`] talks to the v3 HTTP API; use
//! [`MockBackend`] for tests without network access:
//!
//! ```
//! use ranchkit::backend::{Backend, MockBackend};
//! use ranchkit::{Member, Project};
//!
//! let mock = MockBackend::new();
//! let id = mock.create_project("c-1", &Project::new("demo")).unwrap();
//! mock.bind_member(&id, &Member::user("local://u-1", "project-owner")).unwrap();
//!
//! assert_eq!(mock.list_project_bindings(&id).unwrap().len(), 1);
//! ```

pub mod rancher;

use crate::error::{Error, Result};
use crate::principal::parse_group_name;
use crate::types::{Entity, Member, MemberType, Project, ProjectFields, ProjectQuotas};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Remote entity store for clusters, projects, namespaces and bindings.
///
/// Every method is a single request/response. Implementations report
/// transport problems as [`Error::Transport`] and refused operations as
/// [`Error::Rejected`] so callers can log them differently.
pub trait Backend: Send + Sync {
    /// List all clusters.
    fn list_clusters(&self) -> Result<Vec<Entity>>;

    /// List namespace ids of a cluster.
    fn list_namespaces(&self, cluster_id: &str) -> Result<Vec<String>>;

    /// List projects of a cluster.
    fn list_projects(&self, cluster_id: &str) -> Result<Vec<Entity>>;

    /// List namespace ids belonging to a project.
    fn list_project_namespaces(&self, cluster_id: &str, project_id: &str) -> Result<Vec<String>>;

    /// List role bindings of a project, users and groups alike.
    fn list_project_bindings(&self, project_id: &str) -> Result<Vec<Member>>;

    /// Fetch project and namespace-default quotas.
    fn get_project_quotas(&self, project_id: &str) -> Result<ProjectQuotas>;

    /// Fetch name, description and PSP of a project.
    fn get_project_fields(&self, project_id: &str) -> Result<ProjectFields>;

    /// Create a project shell (fields and quotas, no members).
    ///
    /// Returns the id found in the response, which may be empty.
    fn create_project(&self, cluster_id: &str, project: &Project) -> Result<String>;

    /// Replace fields and quotas of an existing project.
    fn replace_project(&self, cluster_id: &str, project_id: &str, project: &Project) -> Result<()>;

    /// Set the pod security policy template of a project.
    fn set_project_security_policy(&self, project_id: &str, policy_id: &str) -> Result<()>;

    /// Bind a member to a project.
    fn bind_member(&self, project_id: &str, member: &Member) -> Result<()>;

    /// Remove a role binding by its id.
    fn unbind_member(&self, binding_id: &str) -> Result<()>;

    /// List names of the directory groups bound to a project.
    ///
    /// Group principals that cannot be parsed are logged and skipped.
    fn list_project_groups(&self, project_id: &str) -> Result<Vec<String>> {
        let groups = self
            .list_project_bindings(project_id)?
            .iter()
            .filter(|m| m.member_type == MemberType::Group && !m.principal_id.is_empty())
            .filter_map(|m| match parse_group_name(&m.principal_id) {
                Ok(name) => Some(name.to_string()),
                Err(e) => {
                    log::error!("Skipping group binding of project '{project_id}': {e}");
                    None
                }
            })
            .collect();
        Ok(groups)
    }
}

// =============================================================================
// Mock backend
// =============================================================================

#[derive(Debug, Default)]
struct MockState {
    clusters: Vec<Entity>,
    namespaces: Vec<MockNamespace>,
    projects: BTreeMap<String, MockProject>,
    bindings: Vec<MockBinding>,
    next_id: u64,
    faults: Faults,
    calls: Vec<String>,
}

#[derive(Debug, Clone)]
struct MockNamespace {
    cluster_id: String,
    project_id: Option<String>,
    id: String,
}

#[derive(Debug, Clone)]
struct MockProject {
    cluster_id: String,
    fields: ProjectFields,
    quotas: ProjectQuotas,
}

#[derive(Debug, Clone)]
struct MockBinding {
    project_id: String,
    member: Member,
}

#[derive(Debug, Default)]
struct Faults {
    reject_create: HashSet<String>,
    omit_created_id: bool,
    fail_replace: bool,
    fail_policy: bool,
    fail_bind: HashSet<String>,
    fail_unbind: HashSet<String>,
    fail_bindings_read: bool,
}

/// In-memory backend for testing without network access.
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect another. Failures are injected per operation.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a cluster.
    pub fn add_cluster(&self, id: &str, name: &str) {
        self.state().clusters.push(Entity::new(id, name));
    }

    /// Register a namespace, optionally assigned to a project.
    pub fn add_namespace(&self, cluster_id: &str, id: &str, project_id: Option<&str>) {
        self.state().namespaces.push(MockNamespace {
            cluster_id: cluster_id.to_string(),
            project_id: project_id.map(str::to_string),
            id: id.to_string(),
        });
    }

    /// Insert an existing project with its bindings; returns its id.
    ///
    /// Bindings without an id get a generated one.
    pub fn insert_project(&self, cluster_id: &str, project: &Project) -> String {
        let mut state = self.state();
        let id = if project.id.is_empty() {
            state.next_project_id(cluster_id)
        } else {
            project.id.clone()
        };
        state.projects.insert(
            id.clone(),
            MockProject {
                cluster_id: cluster_id.to_string(),
                fields: project.fields(),
                quotas: project.resource_quotas.clone(),
            },
        );
        for member in &project.members {
            state.add_binding(&id, member);
        }
        id
    }

    /// Reject creation of projects with this name (HTTP 422).
    pub fn reject_create(&self, name: &str) {
        self.state().faults.reject_create.insert(name.to_string());
    }

    /// Answer creates with a body that has no id.
    pub fn omit_created_id(&self) {
        self.state().faults.omit_created_id = true;
    }

    /// Reject every project replace (HTTP 500).
    pub fn fail_replace(&self) {
        self.state().faults.fail_replace = true;
    }

    /// Reject every PSP change (HTTP 403).
    pub fn fail_policy(&self) {
        self.state().faults.fail_policy = true;
    }

    /// Reject binding of this principal (HTTP 422).
    pub fn fail_bind(&self, principal_id: &str) {
        self.state().faults.fail_bind.insert(principal_id.to_string());
    }

    /// Fail removal of bindings of this principal (HTTP 500).
    pub fn fail_unbind(&self, principal_id: &str) {
        self.state()
            .faults
            .fail_unbind
            .insert(principal_id.to_string());
    }

    /// Make listing project bindings fail with a transport error.
    pub fn fail_bindings_read(&self) {
        self.state().faults.fail_bindings_read = true;
    }

    /// Operations performed so far, e.g. `"bind c-1:p-1 User local://u-1"`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Number of recorded calls whose description starts with `prefix`.
    pub fn call_count(&self, prefix: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Number of projects stored.
    pub fn project_count(&self) -> usize {
        self.state().projects.len()
    }
}

impl MockState {
    fn next_project_id(&mut self, cluster_id: &str) -> String {
        self.next_id += 1;
        format!("{cluster_id}:p-{}", self.next_id)
    }

    fn add_binding(&mut self, project_id: &str, member: &Member) {
        let mut member = member.clone();
        if member.id.is_empty() {
            self.next_id += 1;
            member.id = format!("{}:b-{}", local_id(project_id), self.next_id);
        }
        self.bindings.push(MockBinding {
            project_id: project_id.to_string(),
            member,
        });
    }

    fn project(&self, project_id: &str) -> Result<&MockProject> {
        self.projects.get(project_id).ok_or_else(|| Error::NotFound {
            kind: "project",
            id: project_id.to_string(),
        })
    }
}

/// `c-1:p-2` → `p-2`, the form Rancher uses as binding id prefix.
fn local_id(project_id: &str) -> &str {
    project_id
        .split_once(':')
        .map_or(project_id, |(_, local)| local)
}

fn rejected(operation: &str, status: u16) -> Error {
    Error::Rejected {
        operation: operation.to_string(),
        status,
        body: String::from("{\"type\":\"error\"}"),
    }
}

impl Backend for MockBackend {
    fn list_clusters(&self) -> Result<Vec<Entity>> {
        Ok(self.state().clusters.clone())
    }

    fn list_namespaces(&self, cluster_id: &str) -> Result<Vec<String>> {
        Ok(self
            .state()
            .namespaces
            .iter()
            .filter(|n| n.cluster_id == cluster_id)
            .map(|n| n.id.clone())
            .collect())
    }

    fn list_projects(&self, cluster_id: &str) -> Result<Vec<Entity>> {
        Ok(self
            .state()
            .projects
            .iter()
            .filter(|(_, p)| p.cluster_id == cluster_id)
            .map(|(id, p)| Entity::new(id.clone(), p.fields.name.clone()))
            .collect())
    }

    fn list_project_namespaces(&self, cluster_id: &str, project_id: &str) -> Result<Vec<String>> {
        Ok(self
            .state()
            .namespaces
            .iter()
            .filter(|n| n.cluster_id == cluster_id && n.project_id.as_deref() == Some(project_id))
            .map(|n| n.id.clone())
            .collect())
    }

    fn list_project_bindings(&self, project_id: &str) -> Result<Vec<Member>> {
        let state = self.state();
        if state.faults.fail_bindings_read {
            return Err(Error::transport("list project bindings", "connection reset"));
        }
        Ok(state
            .bindings
            .iter()
            .filter(|b| b.project_id == project_id)
            .map(|b| b.member.clone())
            .collect())
    }

    fn get_project_quotas(&self, project_id: &str) -> Result<ProjectQuotas> {
        let state = self.state();
        Ok(state.project(project_id)?.quotas.clone())
    }

    fn get_project_fields(&self, project_id: &str) -> Result<ProjectFields> {
        let state = self.state();
        Ok(state.project(project_id)?.fields.clone())
    }

    fn create_project(&self, cluster_id: &str, project: &Project) -> Result<String> {
        let mut state = self.state();
        state.calls.push(format!("create {cluster_id} {}", project.name));
        if state.faults.reject_create.contains(&project.name) {
            return Err(rejected("create project", 422));
        }

        let id = state.next_project_id(cluster_id);
        state.projects.insert(
            id.clone(),
            MockProject {
                cluster_id: cluster_id.to_string(),
                fields: ProjectFields {
                    pod_security_policy_id: String::new(),
                    ..project.fields()
                },
                quotas: project.resource_quotas.clone(),
            },
        );

        if state.faults.omit_created_id {
            return Ok(String::new());
        }
        Ok(id)
    }

    fn replace_project(&self, cluster_id: &str, project_id: &str, project: &Project) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("replace {project_id}"));
        if state.faults.fail_replace {
            return Err(rejected("update project", 500));
        }
        let psp = state.project(project_id)?.fields.pod_security_policy_id.clone();
        state.projects.insert(
            project_id.to_string(),
            MockProject {
                cluster_id: cluster_id.to_string(),
                fields: ProjectFields {
                    pod_security_policy_id: psp,
                    ..project.fields()
                },
                quotas: project.resource_quotas.clone(),
            },
        );
        Ok(())
    }

    fn set_project_security_policy(&self, project_id: &str, policy_id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("psp {project_id} {policy_id}"));
        if state.faults.fail_policy {
            return Err(rejected("set project PSP", 403));
        }
        let project = state.projects.get_mut(project_id).ok_or_else(|| Error::NotFound {
            kind: "project",
            id: project_id.to_string(),
        })?;
        project.fields.pod_security_policy_id = policy_id.to_string();
        Ok(())
    }

    fn bind_member(&self, project_id: &str, member: &Member) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!(
            "bind {project_id} {} {}",
            member.member_type, member.principal_id
        ));
        if state.faults.fail_bind.contains(&member.principal_id) {
            return Err(rejected("add project member", 422));
        }
        state.project(project_id)?;
        state.add_binding(project_id, &Member { id: String::new(), ..member.clone() });
        Ok(())
    }

    fn unbind_member(&self, binding_id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("unbind {binding_id}"));
        let position = state
            .bindings
            .iter()
            .position(|b| b.member.id == binding_id)
            .ok_or_else(|| rejected("delete project member", 404))?;
        if state
            .faults
            .fail_unbind
            .contains(&state.bindings[position].member.principal_id)
        {
            return Err(rejected("delete project member", 500));
        }
        state.bindings.remove(position);
        Ok(())
    }
}
