// Cluster-wide listings
pub mod cluster;

// Project snapshot, apply and diff
pub mod project;

use anyhow::Result;
use ranchkit::Backend;

/// Remote store and target cluster shared by cluster-scoped commands.
pub struct Target<'a> {
    pub backend: &'a dyn Backend,
    pub cluster_id: &'a str,
}

impl<'a> Target<'a> {
    pub fn new(backend: &'a dyn Backend, cluster_id: &'a str) -> Self {
        Self {
            backend,
            cluster_id,
        }
    }

    pub fn reconciler(&self) -> ranchkit::Reconciler<'a> {
        ranchkit::Reconciler::new(self.backend, self.cluster_id)
    }
}

/// Write data output unadorned so it can be redirected.
pub fn emit(content: &str) -> Result<()> {
    use std::io::Write;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(content.as_bytes())?;
    if !content.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    Ok(())
}
