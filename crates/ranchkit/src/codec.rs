//! YAML project files.
//!
//! A project file holds a `projects:` list. JSON documents are accepted as
//! well since they are valid YAML.

use crate::error::{Error, Result};
use crate::types::ProjectList;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Decode and validate a project list.
pub fn decode_projects(content: &str) -> Result<ProjectList> {
    let list: ProjectList = serde_yaml::from_str(content)?;
    validate(&list)?;
    Ok(list)
}

/// Read and decode a project file.
pub fn read_projects(path: &Path) -> Result<ProjectList> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    log::debug!("Read project file {}", path.display());
    decode_projects(&content)
}

/// Encode a value as YAML.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}

fn validate(list: &ProjectList) -> Result<()> {
    for (i, project) in list.projects.iter().enumerate() {
        if project.name.trim().is_empty() {
            return Err(Error::Decode(format!("project #{} has an empty name", i + 1)));
        }
        for member in &project.members {
            if member.principal_id.is_empty() {
                return Err(Error::Decode(format!(
                    "project '{}': member with empty principalId",
                    project.name
                )));
            }
            if member.role_template_id.is_empty() {
                return Err(Error::Decode(format!(
                    "project '{}': member '{}' has an empty roleTemplateId",
                    project.name, member.principal_id
                )));
            }
        }
    }
    Ok(())
}
