use anyhow::{Context, Result, bail};
use colored::Colorize;
use ranchkit::{
    ApplyMode, Backend, MembershipAction, Project, ProjectList, ProjectOutcome,
    ProjectPlan, ProgressCallback, QuotaChange, UpdatePlan, apply_all, codec,
};
use std::path::Path;

use crate::cli::OutputFormat;
use crate::commands::{Target, emit};
use crate::ui;

// ============================================================================
// Listing and snapshots
// ============================================================================

pub fn ls(target: &Target<'_>) -> Result<()> {
    let projects = target
        .backend
        .list_projects(target.cluster_id)
        .with_context(|| format!("Could not list projects of cluster '{}'", target.cluster_id))?;
    if projects.is_empty() {
        ui::info("No projects found");
        return Ok(());
    }
    let rows: Vec<(String, String)> = projects.into_iter().map(|p| (p.id, p.name)).collect();
    ui::table(&rows);
    Ok(())
}

pub fn get(target: &Target<'_>, id: Option<&str>, format: OutputFormat) -> Result<()> {
    let rendered = match id {
        Some(id) => render(&snapshot(target, id)?, format)?,
        None => render(&snapshot_all(target)?, format)?,
    };
    emit(&rendered)
}

fn snapshot(target: &Target<'_>, id: &str) -> Result<Project> {
    target
        .reconciler()
        .get_detail(id)
        .with_context(|| format!("Could not fetch project '{id}'"))
}

/// Snapshot every project of the cluster; projects that fail to load are skipped.
fn snapshot_all(target: &Target<'_>) -> Result<ProjectList> {
    let reconciler = target.reconciler();
    let entities = target
        .backend
        .list_projects(target.cluster_id)
        .with_context(|| format!("Could not list projects of cluster '{}'", target.cluster_id))?;

    let projects = entities
        .iter()
        .filter_map(|entity| match reconciler.get_detail(&entity.id) {
            Ok(project) => Some(project),
            Err(e) => {
                log::error!("Skipping project '{}' ({}): {e}", entity.name, entity.id);
                None
            }
        })
        .collect();
    Ok(ProjectList::new(projects))
}

fn render<T: serde::Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Yaml => codec::encode(value)?,
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
    })
}

pub fn groups(backend: &dyn Backend, project_id: &str) -> Result<()> {
    let groups = backend
        .list_project_groups(project_id)
        .with_context(|| format!("Could not list groups of project '{project_id}'"))?;
    if groups.is_empty() {
        ui::info(&format!("No groups bound to project '{project_id}'"));
        return Ok(());
    }
    for group in groups {
        println!("{group}");
    }
    Ok(())
}

pub fn delete(id: &str) -> Result<()> {
    ranchkit::delete_project(id).with_context(|| format!("Could not delete project '{id}'"))
}

// ============================================================================
// Apply
// ============================================================================

/// Progress output for batch apply.
struct ApplyProgress;

impl ProgressCallback for ApplyProgress {
    fn on_project_start(&mut self, index: usize, total: usize, project: &Project) {
        let verb = if project.is_new() { "Creating" } else { "Updating" };
        ui::step(index + 1, total, &format!("{verb} project '{}'", project.name));
    }

    fn on_project_complete(&mut self, outcome: &ProjectOutcome) {
        match &outcome.result {
            Ok(report) => {
                let done = match outcome.mode {
                    ApplyMode::Create => "Created",
                    ApplyMode::Update => "Updated",
                };
                ui::success(&format!("{done} '{}' ({})", outcome.name, report.project_id));
                if !report.bound.is_empty() || !report.unbound.is_empty() {
                    ui::dim(&format!(
                        "{} member(s) bound, {} removed",
                        report.bound.len(),
                        report.unbound.len()
                    ));
                }
                for failure in &report.failures {
                    let action = match failure.action {
                        MembershipAction::Bind => "bind",
                        MembershipAction::Unbind => "unbind",
                    };
                    ui::warn(&format!(
                        "Could not {action} {}: {}",
                        failure.member, failure.error
                    ));
                }
            }
            Err(e) => ui::error(&format!("'{}': {e}", outcome.name)),
        }
    }
}

pub fn apply(target: &Target<'_>, path: &Path, dry_run: bool) -> Result<()> {
    if dry_run {
        ui::warn("Dry run - no changes will be made");
        return diff(target, path);
    }

    let list = load(path)?;
    ui::header(&format!("Applying {} project(s) to cluster {}", list.len(), target.cluster_id));

    let summary = apply_all(&target.reconciler(), &list, &mut ApplyProgress);

    println!();
    ui::kv("Created", &summary.created().to_string());
    ui::kv("Updated", &summary.updated().to_string());
    if summary.partial() > 0 {
        ui::kv("With member failures", &summary.partial().to_string());
    }
    if summary.update_failures() > 0 {
        ui::warn(&format!("{} project update(s) failed", summary.update_failures()));
    }
    if !summary.is_success() {
        bail!("{} project(s) could not be created", summary.create_failures());
    }
    ui::success("Apply complete!");
    Ok(())
}

fn load(path: &Path) -> Result<ProjectList> {
    codec::read_projects(path).with_context(|| format!("Could not load {}", path.display()))
}

// ============================================================================
// Diff
// ============================================================================

pub fn diff(target: &Target<'_>, path: &Path) -> Result<()> {
    let list = load(path)?;
    let plans = plan_all(target, &list);
    let mut failed = 0;

    for (project, plan) in list.projects.iter().zip(&plans) {
        match plan {
            Ok(plan) => print_plan(project, plan),
            Err(e) => {
                failed += 1;
                ui::error(&format!("'{}': {e:#}", project.name));
            }
        }
    }

    if failed > 0 {
        bail!("Could not compute the plan of {failed} project(s)");
    }
    Ok(())
}

fn plan_all(target: &Target<'_>, list: &ProjectList) -> Vec<Result<ProjectPlan>> {
    let reconciler = target.reconciler();
    list.projects
        .iter()
        .map(|project| {
            reconciler
                .plan(project)
                .with_context(|| format!("Could not read project '{}'", project.id))
        })
        .collect()
}

fn print_plan(project: &Project, plan: &ProjectPlan) {
    match plan {
        ProjectPlan::Create { name, members } => {
            ui::header(&format!("Project {name} (new)"));
            ui::change('+', &format!("create project with {members} member(s)"));
        }
        ProjectPlan::Update(update) => {
            ui::header(&format!("Project {} ({})", project.name, update.project_id));
            if update.has_changes() {
                print_update(update);
            } else {
                ui::dim("No changes");
            }
        }
    }
}

fn print_update(plan: &UpdatePlan) {
    for change in &plan.fields {
        ui::change(
            '~',
            &format!("{}: {} → {}", change.field, quoted(&change.from), quoted(&change.to)),
        );
    }
    for change in &plan.quotas {
        let (sign, text) = describe_quota(change);
        ui::change(sign, &text);
    }
    for member in &plan.membership.to_add {
        ui::change('+', &format!("member {member}"));
    }
    for member in &plan.membership.to_remove {
        ui::change('-', &format!("member {member} [{}]", member.id.dimmed()));
    }
}

fn describe_quota(change: &QuotaChange) -> (char, String) {
    let name = format!("{}.{}", change.scope, change.resource);
    match (&change.from, &change.to) {
        (None, Some(to)) => ('+', format!("quota {name} = {to}")),
        (Some(from), None) => ('-', format!("quota {name} = {from}")),
        (from, to) => (
            '~',
            format!(
                "quota {name}: {} → {}",
                from.as_deref().unwrap_or_default(),
                to.as_deref().unwrap_or_default()
            ),
        ),
    }
}

fn quoted(value: &str) -> String {
    format!("'{value}'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ranchkit::{BatchSummary, Member, MockBackend, NoProgress};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CLUSTER: &str = "c-1";

    fn apply_quiet(target: &Target<'_>, path: &Path) -> Result<BatchSummary> {
        let list = load(path)?;
        Ok(apply_all(&target.reconciler(), &list, &mut NoProgress))
    }

    fn project_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_apply_creates_projects_from_file() {
        let mock = MockBackend::new();
        let target = Target::new(&mock, CLUSTER);
        let file = project_file(
            "projects:\n  - name: team-a\n    podSecurityPolicyId: restricted\n    members:\n    - type: User\n      principalId: local://u-1\n      roleTemplateId: project-owner\n",
        );

        let summary = apply_quiet(&target, file.path()).unwrap();
        assert!(summary.is_success());
        assert_eq!(mock.project_count(), 1);
        assert_eq!(mock.call_count("bind"), 1);
        assert_eq!(mock.call_count("psp"), 1);
    }

    #[test]
    fn test_apply_fails_on_create_rejection() {
        let mock = MockBackend::new();
        mock.reject_create("team-b");
        let target = Target::new(&mock, CLUSTER);
        let file = project_file("projects:\n  - name: team-a\n  - name: team-b\n");

        assert!(apply(&target, file.path(), false).is_err());
        assert_eq!(mock.project_count(), 1);
    }

    #[test]
    fn test_apply_dry_run_writes_nothing() {
        let mock = MockBackend::new();
        let target = Target::new(&mock, CLUSTER);
        let file = project_file("projects:\n  - name: team-a\n");

        apply(&target, file.path(), true).unwrap();
        assert!(mock.calls().is_empty());
        assert_eq!(mock.project_count(), 0);
    }

    #[test]
    fn test_apply_invalid_file() {
        let mock = MockBackend::new();
        let target = Target::new(&mock, CLUSTER);
        let file = project_file("projects:\n  - name: ''\n");
        assert!(apply(&target, file.path(), false).is_err());
    }

    #[test]
    fn test_diff_fails_for_unknown_project() {
        let mock = MockBackend::new();
        let target = Target::new(&mock, CLUSTER);
        let file = project_file("projects:\n  - id: c-1:p-404\n    name: gone\n");
        assert!(diff(&target, file.path()).is_err());
    }

    #[test]
    fn test_snapshot_all_skips_broken_projects() {
        let mock = MockBackend::new();
        let mut project = Project::new("team-a");
        project.members = vec![Member::user("local://u-1", "project-owner")];
        mock.insert_project(CLUSTER, &project);
        let target = Target::new(&mock, CLUSTER);

        let list = snapshot_all(&target).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.projects[0].members, project.members);

        mock.fail_bindings_read();
        assert!(snapshot_all(&target).unwrap().is_empty());
    }

    #[test]
    fn test_get_output_applies_back_as_update() {
        let mock = MockBackend::new();
        let id = mock.insert_project(CLUSTER, &Project::new("team-a"));
        let target = Target::new(&mock, CLUSTER);

        let yaml = render(&snapshot_all(&target).unwrap(), OutputFormat::Yaml).unwrap();
        let list = codec::decode_projects(&yaml).unwrap();
        assert_eq!(list.projects[0].id, id);

        let json = render(&snapshot(&target, &id).unwrap(), OutputFormat::Json).unwrap();
        assert!(json.contains("\"name\": \"team-a\""));
    }

    #[test]
    fn test_delete_is_refused() {
        let err = delete("c-1:p-1").unwrap_err();
        assert!(err.to_string().contains("c-1:p-1"));
        assert!(matches!(
            err.downcast_ref::<ranchkit::Error>(),
            Some(ranchkit::Error::Unsupported { .. })
        ));
    }

    #[test]
    fn test_describe_quota() {
        let change = |from: Option<&str>, to: Option<&str>| QuotaChange {
            scope: "project",
            resource: "limitsCpu".to_string(),
            from: from.map(str::to_string),
            to: to.map(str::to_string),
        };
        assert_eq!(describe_quota(&change(None, Some("2"))).0, '+');
        assert_eq!(describe_quota(&change(Some("1"), None)).0, '-');
        assert_eq!(
            describe_quota(&change(Some("1"), Some("2"))),
            ('~', "quota project.limitsCpu: 1 → 2".to_string())
        );
    }
}
