mod cli;
mod commands;
mod settings;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use commands::Target;
use ranchkit::RancherBackend;
use settings::{Settings, SettingsFile};
use std::io;

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(log_level(&cli))
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let result = run(cli);
    if let Err(e) = &result {
        explain(e);
    }
    result
}

fn log_level(cli: &Cli) -> log::LevelFilter {
    if cli.quiet {
        return log::LevelFilter::Error;
    }
    match (cli.debug, cli.verbose) {
        (_, v) if v >= 2 => log::LevelFilter::Trace,
        (true, _) | (_, 1) => log::LevelFilter::Debug,
        _ => log::LevelFilter::Info,
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "rancherctl", &mut io::stdout());
        return Ok(());
    }
    // Refused without needing a server or credentials
    if let Command::Delete { id } = &cli.command {
        return commands::project::delete(id);
    }

    let file = SettingsFile::load(cli.config.as_deref())?;
    let settings = Settings::resolve(cli.connection, file);
    let backend = RancherBackend::new(settings.server_url()?, settings.token()?);
    log::debug!("Using Rancher server {}", backend.server_url());

    // Only cluster-scoped commands need a cluster id
    let cluster_id = settings.cluster_id();

    match cli.command {
        Command::Ls => commands::project::ls(&Target::new(&backend, cluster_id?)),
        Command::Get(args) => {
            let target = Target::new(&backend, cluster_id?);
            commands::project::get(&target, args.id.as_deref(), args.output)
        }
        Command::Apply(args) => {
            let target = Target::new(&backend, cluster_id?);
            commands::project::apply(&target, &args.file.filename, args.dry_run)
        }
        Command::Diff(args) => {
            commands::project::diff(&Target::new(&backend, cluster_id?), &args.filename)
        }
        Command::Clusters => commands::cluster::clusters(&backend),
        Command::Namespaces { project } => {
            let target = Target::new(&backend, cluster_id?);
            commands::cluster::namespaces(&target, project.as_deref())
        }
        Command::Groups { project_id } => commands::project::groups(&backend, &project_id),
        // Handled before settings are resolved
        Command::Completions { .. } | Command::Delete { .. } => Ok(()),
    }
}

/// Print advice for library errors before anyhow reports the chain.
fn explain(err: &anyhow::Error) {
    if let Some(e) = err.chain().find_map(|c| c.downcast_ref::<ranchkit::Error>()) {
        let category = e.category();
        ui::error(&format!("{category}: {}", category.advice()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["rancherctl"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(&parse(&["ls"])), log::LevelFilter::Info);
        assert_eq!(log_level(&parse(&["--debug", "ls"])), log::LevelFilter::Debug);
        assert_eq!(log_level(&parse(&["-v", "ls"])), log::LevelFilter::Debug);
        assert_eq!(log_level(&parse(&["-vv", "ls"])), log::LevelFilter::Trace);
        assert_eq!(log_level(&parse(&["-q", "-v", "ls"])), log::LevelFilter::Error);
    }

    #[test]
    fn test_delete_needs_no_connection_settings() {
        // A missing settings file would fail the load if it were read
        let err = run(parse(&["--config", "/nonexistent/rancherctl.toml", "delete", "c-1:p-1"]))
            .unwrap_err();
        let lib_err = err
            .chain()
            .find_map(|c| c.downcast_ref::<ranchkit::Error>())
            .unwrap();
        assert!(matches!(lib_err, ranchkit::Error::Unsupported { .. }));
    }
}
