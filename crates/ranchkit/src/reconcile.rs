//! Reconciliation of one project against Rancher.
//!
//! Writes happen in a fixed order: project shell or replace, PSP, then
//! membership. Failures of the project itself or of its PSP abort the call.
//! Membership changes are best-effort: each failed bind or unbind is logged
//! and recorded in the [`ApplyReport`] while the remaining ones still run, so
//! membership converges over repeated applies.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::membership::{MembershipDiff, diff_members};
use crate::types::{Member, Project, Quotas};
use log::{debug, error, info};
use std::collections::BTreeSet;

/// Kind of membership step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipAction {
    /// Creating a role binding
    Bind,
    /// Removing a role binding
    Unbind,
}

/// A membership step that failed without failing the project.
#[derive(Debug, Clone)]
pub struct MembershipFailure {
    /// What was attempted
    pub action: MembershipAction,
    /// The member involved
    pub member: Member,
    /// Error message from the backend
    pub error: String,
}

/// Outcome of a successful create or update.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    /// Id of the project that was created or updated
    pub project_id: String,
    /// Members successfully bound
    pub bound: Vec<Member>,
    /// Bindings successfully removed
    pub unbound: Vec<Member>,
    /// Whether the PSP was (re)set
    pub policy_changed: bool,
    /// Membership steps that failed
    pub failures: Vec<MembershipFailure>,
}

impl ApplyReport {
    fn new(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            ..Default::default()
        }
    }

    /// Whether some membership steps failed.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    fn bind(&mut self, backend: &dyn Backend, member: &Member) {
        match backend.bind_member(&self.project_id, member) {
            Ok(()) => self.bound.push(member.clone()),
            Err(e) => {
                error!(
                    "Failed to bind member '{member}' to project '{}': {e}",
                    self.project_id
                );
                self.failures.push(MembershipFailure {
                    action: MembershipAction::Bind,
                    member: member.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    fn unbind(&mut self, backend: &dyn Backend, member: &Member) {
        match backend.unbind_member(&member.id) {
            Ok(()) => self.unbound.push(member.clone()),
            Err(e) => {
                error!(
                    "Failed to remove member '{member}' (binding '{}') from project '{}': {e}",
                    member.id, self.project_id
                );
                self.failures.push(MembershipFailure {
                    action: MembershipAction::Unbind,
                    member: member.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
}

/// A scalar field that would change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// Config file name of the field
    pub field: &'static str,
    /// Current remote value
    pub from: String,
    /// Desired value
    pub to: String,
}

/// A quota entry that would change; `None` means "not set".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaChange {
    /// "project" or "namespace"
    pub scope: &'static str,
    /// Resource name, e.g. `limitsCpu`
    pub resource: String,
    /// Current remote value
    pub from: Option<String>,
    /// Desired value
    pub to: Option<String>,
}

/// Changes an update would make to an existing project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePlan {
    /// Project being updated
    pub project_id: String,
    /// Changed name/description/PSP
    pub fields: Vec<FieldChange>,
    /// Changed quota entries
    pub quotas: Vec<QuotaChange>,
    /// Bindings to create and remove
    pub membership: MembershipDiff,
}

impl UpdatePlan {
    /// Whether applying would change anything.
    pub fn has_changes(&self) -> bool {
        !self.fields.is_empty() || !self.quotas.is_empty() || !self.membership.is_empty()
    }

    /// The PSP change, if any.
    pub fn policy_change(&self) -> Option<&FieldChange> {
        self.fields.iter().find(|c| c.field == "podSecurityPolicyId")
    }
}

/// What applying a desired project would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectPlan {
    /// Project does not exist yet and would be created with its members
    Create {
        /// Name of the project
        name: String,
        /// Members that would be bound
        members: usize,
    },
    /// Existing project would be updated
    Update(UpdatePlan),
}

/// Reconciles desired projects against one cluster.
pub struct Reconciler<'a> {
    backend: &'a dyn Backend,
    cluster_id: String,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler for a cluster.
    pub fn new(backend: &'a dyn Backend, cluster_id: impl Into<String>) -> Self {
        Self {
            backend,
            cluster_id: cluster_id.into(),
        }
    }

    /// Create a project with its members and PSP.
    ///
    /// Fails if the project cannot be created, the response has no id, or the
    /// PSP cannot be set. Member binding failures are only recorded.
    pub fn create(&self, desired: &Project) -> Result<ApplyReport> {
        let project_id = self.backend.create_project(&self.cluster_id, desired)?;
        debug!("Created project with ID='{project_id}'");
        if project_id.is_empty() {
            return Err(Error::MissingIdentity {
                name: desired.name.clone(),
            });
        }

        let mut report = ApplyReport::new(&project_id);
        debug!("Setting project members to project '{project_id}'");
        for member in &desired.members {
            report.bind(self.backend, member);
        }

        debug!(
            "Setting PSP '{}' to project '{project_id}'",
            desired.pod_security_policy_id
        );
        self.backend
            .set_project_security_policy(&project_id, &desired.pod_security_policy_id)?;
        report.policy_changed = true;

        Ok(report)
    }

    /// Update an existing project to match `desired`.
    ///
    /// Quotas are replaced as a whole. Fails if the current state cannot be
    /// fetched, the replace is rejected, or a changed PSP cannot be set.
    /// Membership failures are only recorded.
    pub fn update(&self, project_id: &str, desired: &Project) -> Result<ApplyReport> {
        debug!(
            "Updating project ID='{project_id}' in cluster ID='{}'",
            self.cluster_id
        );
        let current = self.get_detail(project_id)?;

        self.backend
            .replace_project(&self.cluster_id, project_id, desired)?;

        let mut report = ApplyReport::new(project_id);
        if current.pod_security_policy_id != desired.pod_security_policy_id {
            debug!(
                "Project PSP changed, updating to '{}'",
                desired.pod_security_policy_id
            );
            self.backend
                .set_project_security_policy(project_id, &desired.pod_security_policy_id)?;
            report.policy_changed = true;
        }

        let diff = diff_members(&desired.members, &current.members);
        debug!("New members: {:?}", diff.to_add);
        debug!("Deleted members: {:?}", diff.to_remove);

        for member in &diff.to_add {
            report.bind(self.backend, member);
        }
        for member in &diff.to_remove {
            report.unbind(self.backend, member);
        }

        debug!("Updated project with ID='{project_id}'");
        Ok(report)
    }

    /// Fetch a complete snapshot of a project. Any failed read fails the call.
    pub fn get_detail(&self, project_id: &str) -> Result<Project> {
        let resource_quotas = self.backend.get_project_quotas(project_id)?;
        let members = self.backend.list_project_bindings(project_id)?;
        let fields = self.backend.get_project_fields(project_id)?;

        Ok(Project {
            id: project_id.to_string(),
            name: fields.name,
            description: fields.description,
            pod_security_policy_id: fields.pod_security_policy_id,
            members,
            resource_quotas,
        })
    }

    /// Compute what applying `desired` would change, without writing.
    pub fn plan(&self, desired: &Project) -> Result<ProjectPlan> {
        if desired.is_new() {
            return Ok(ProjectPlan::Create {
                name: desired.name.clone(),
                members: desired.members.len(),
            });
        }

        let current = self.get_detail(&desired.id)?;
        let fields = [
            ("name", &current.name, &desired.name),
            ("description", &current.description, &desired.description),
            (
                "podSecurityPolicyId",
                &current.pod_security_policy_id,
                &desired.pod_security_policy_id,
            ),
        ]
        .into_iter()
        .filter(|(_, from, to)| from != to)
        .map(|(field, from, to)| FieldChange {
            field,
            from: from.clone(),
            to: to.clone(),
        })
        .collect();

        let mut quotas = quota_changes(
            "project",
            &current.resource_quotas.project,
            &desired.resource_quotas.project,
        );
        quotas.extend(quota_changes(
            "namespace",
            &current.resource_quotas.namespace,
            &desired.resource_quotas.namespace,
        ));

        Ok(ProjectPlan::Update(UpdatePlan {
            project_id: desired.id.clone(),
            fields,
            quotas,
            membership: diff_members(&desired.members, &current.members),
        }))
    }

    /// Deleting projects is not supported; see [`delete_project`].
    pub fn delete(&self, project_id: &str) -> Result<()> {
        delete_project(project_id)
    }
}

/// Deleting projects is not supported.
///
/// Always fails with [`Error::Unsupported`] and never contacts a backend.
pub fn delete_project(project_id: &str) -> Result<()> {
    info!("Refusing to delete project '{project_id}'");
    Err(Error::Unsupported {
        operation: "deleting a project".to_string(),
    })
}

/// Entries that differ between two quota maps, in resource name order.
fn quota_changes(scope: &'static str, current: &Quotas, desired: &Quotas) -> Vec<QuotaChange> {
    let resources: BTreeSet<&String> = current.keys().chain(desired.keys()).collect();
    resources
        .into_iter()
        .filter_map(|resource| {
            let from = current.get(resource);
            let to = desired.get(resource);
            (from != to).then(|| QuotaChange {
                scope,
                resource: resource.clone(),
                from: from.cloned(),
                to: to.cloned(),
            })
        })
        .collect()
}
