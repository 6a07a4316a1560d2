//! # ranchkit
//!
//! Declarative management of Rancher projects.
//!
//! This crate provides functionality for:
//! - Reading and writing YAML project files
//! - Creating and updating projects with their quotas, PSP and members
//! - Computing membership drift and change plans without writing
//! - Listing clusters, namespaces and the directory groups of a project
//!
//! ## Example
//!
//! ```no_run
//! use ranchkit::{NoProgress, RancherBackend, Reconciler, apply_all, codec};
//! use std::path::Path;
//!
//! let backend = RancherBackend::new("https://rancher.example.com", "token-xyz");
//! let reconciler = Reconciler::new(&backend, "c-abc12");
//!
//! let list = codec::read_projects(Path::new("projects.yaml")).expect("invalid file");
//! let summary = apply_all(&reconciler, &list, &mut NoProgress);
//!
//! println!("{} created, {} updated", summary.created(), summary.updated());
//! ```
//!
//! ## Membership
//!
//! Members are compared by `(type, principal, role template)`. Bindings that
//! already exist are left untouched; failed binds and unbinds are reported in
//! the [`ApplyReport`] and retried by the next apply.
//!
//! ```
//! use ranchkit::{Member, diff_members};
//!
//! let desired = [Member::user("local://u-1", "project-owner")];
//! let current = [Member::user("local://u-1", "project-owner").with_id("p-1:b-1")];
//!
//! assert!(diff_members(&desired, &current).is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod batch;
pub mod codec;
pub mod error;
pub mod membership;
pub mod principal;
pub mod reconcile;
pub mod types;

pub use backend::rancher::RancherBackend;
pub use backend::{Backend, MockBackend};
pub use batch::{
    ApplyMode, BatchSummary, NoProgress, ProgressCallback, ProjectOutcome, apply_all,
};
pub use error::{Error, ErrorCategory, Result};
pub use membership::{MembershipDiff, diff_members};
pub use principal::parse_group_name;
pub use reconcile::{
    ApplyReport, FieldChange, MembershipAction, MembershipFailure, ProjectPlan, QuotaChange,
    Reconciler, UpdatePlan, delete_project,
};
pub use types::{
    Entity, Member, MemberKey, MemberType, Project, ProjectFields, ProjectList, ProjectQuotas,
    Quotas,
};
