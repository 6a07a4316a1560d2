//! Batch apply of a project list.

use crate::error::Error;
use crate::reconcile::{ApplyReport, Reconciler};
use crate::types::{Project, ProjectList};
use log::{error, info, warn};

/// How a project was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Project had no id and was created
    Create,
    /// Project had an id and was updated
    Update,
}

/// Result of applying one project of a batch.
#[derive(Debug)]
pub struct ProjectOutcome {
    /// Name of the project from the config
    pub name: String,
    /// Create or update
    pub mode: ApplyMode,
    /// Report on success, error otherwise
    pub result: Result<ApplyReport, Error>,
}

impl ProjectOutcome {
    /// Whether the project itself was applied.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Progress callback for batch apply
///
/// Implement this trait to render progress while projects are applied.
pub trait ProgressCallback {
    /// Called before a project is applied; `index` starts at 0
    fn on_project_start(&mut self, index: usize, total: usize, project: &Project);

    /// Called after a project was applied, whatever the result
    fn on_project_complete(&mut self, outcome: &ProjectOutcome);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_project_start(&mut self, _index: usize, _total: usize, _project: &Project) {}
    fn on_project_complete(&mut self, _outcome: &ProjectOutcome) {}
}

/// Summary of a batch apply.
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Per-project outcomes in list order
    pub outcomes: Vec<ProjectOutcome>,
}

impl BatchSummary {
    /// Projects successfully created
    pub fn created(&self) -> usize {
        self.count(ApplyMode::Create, true)
    }

    /// Projects successfully updated
    pub fn updated(&self) -> usize {
        self.count(ApplyMode::Update, true)
    }

    /// Projects that failed to be created
    pub fn create_failures(&self) -> usize {
        self.count(ApplyMode::Create, false)
    }

    /// Projects that failed to be updated
    pub fn update_failures(&self) -> usize {
        self.count(ApplyMode::Update, false)
    }

    /// Applied projects with at least one failed membership step
    pub fn partial(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.result.as_ref().is_ok_and(ApplyReport::is_partial))
            .count()
    }

    /// Check if the batch succeeded.
    ///
    /// Only failed creates fail a batch; failed updates are reported but
    /// tolerated.
    pub fn is_success(&self) -> bool {
        self.create_failures() == 0
    }

    fn count(&self, mode: ApplyMode, ok: bool) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.mode == mode && o.is_ok() == ok)
            .count()
    }
}

/// Apply every project of `list` in order.
///
/// Projects without an id are created, the others updated. A failed project
/// never stops the remaining ones.
pub fn apply_all(
    reconciler: &Reconciler<'_>,
    list: &ProjectList,
    progress: &mut dyn ProgressCallback,
) -> BatchSummary {
    let total = list.len();
    let mut summary = BatchSummary::default();

    for (index, project) in list.projects.iter().enumerate() {
        progress.on_project_start(index, total, project);

        let outcome = if project.is_new() {
            let result = reconciler.create(project);
            match &result {
                Ok(report) => info!(
                    "Project '{}' created with ID='{}'",
                    project.name, report.project_id
                ),
                Err(e) => error!("Failed to create project '{}': {e}", project.name),
            }
            ProjectOutcome {
                name: project.name.clone(),
                mode: ApplyMode::Create,
                result,
            }
        } else {
            let result = reconciler.update(&project.id, project);
            match &result {
                Ok(_) => info!("Project '{}' updated", project.name),
                Err(e) => warn!(
                    "Failed to update project '{}' (ID='{}'): {e}",
                    project.name, project.id
                ),
            }
            ProjectOutcome {
                name: project.name.clone(),
                mode: ApplyMode::Update,
                result,
            }
        };

        progress.on_project_complete(&outcome);
        summary.outcomes.push(outcome);
    }

    summary
}
