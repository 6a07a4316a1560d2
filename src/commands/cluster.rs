use anyhow::{Context, Result};
use ranchkit::Backend;

use crate::commands::Target;
use crate::ui;

pub fn clusters(backend: &dyn Backend) -> Result<()> {
    let clusters = backend.list_clusters().context("Could not list clusters")?;
    if clusters.is_empty() {
        ui::info("No clusters found");
        return Ok(());
    }
    let rows: Vec<(String, String)> = clusters.into_iter().map(|c| (c.id, c.name)).collect();
    ui::table(&rows);
    Ok(())
}

pub fn namespaces(target: &Target<'_>, project: Option<&str>) -> Result<()> {
    let namespaces = namespace_ids(target, project)?;
    if namespaces.is_empty() {
        ui::info("No namespaces found");
        return Ok(());
    }
    for namespace in namespaces {
        println!("{namespace}");
    }
    Ok(())
}

fn namespace_ids(target: &Target<'_>, project: Option<&str>) -> Result<Vec<String>> {
    match project {
        Some(project_id) => target
            .backend
            .list_project_namespaces(target.cluster_id, project_id)
            .with_context(|| format!("Could not list namespaces of project '{project_id}'")),
        None => target
            .backend
            .list_namespaces(target.cluster_id)
            .with_context(|| format!("Could not list namespaces of cluster '{}'", target.cluster_id)),
    }
}
