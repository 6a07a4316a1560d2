use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rancherctl")]
#[command(author = "Canh Ngo")]
#[command(version)]
#[command(about = "Manage Rancher projects declaratively", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Settings file (default: <config dir>/rancherctl/config.toml)
    #[arg(long, env = "RANCHERCTL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Connection settings; unset values fall back to the settings file.
#[derive(Args)]
pub struct ConnectionArgs {
    /// Rancher server URL, e.g. https://rancher.example.com
    #[arg(long, env = "RANCHER_URL", global = true)]
    pub rancher_url: Option<String>,

    /// Target cluster ID
    #[arg(long, env = "RANCHER_CLUSTER_ID", global = true)]
    pub cluster: Option<String>,

    /// Rancher API token
    #[arg(long, env = "RANCHER_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List projects of the cluster
    Ls,

    /// Show project details, or all projects of the cluster
    Get(GetArgs),

    /// Create or update projects from a YAML file
    Apply(ApplyArgs),

    /// Show what apply would change
    Diff(FileArgs),

    /// Delete a project (not supported)
    Delete {
        /// Project ID
        id: String,
    },

    /// List clusters
    Clusters,

    /// List namespaces of the cluster or of one project
    Namespaces {
        /// Only namespaces of this project
        #[arg(short, long)]
        project: Option<String>,
    },

    /// List directory groups bound to a project
    Groups {
        /// Project ID
        project_id: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct GetArgs {
    /// Project ID; omit to dump every project of the cluster
    pub id: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub output: OutputFormat,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub file: FileArgs,

    /// Only show what would change
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct FileArgs {
    /// YAML file with a `projects:` list
    #[arg(short, long)]
    pub filename: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from([
            "rancherctl",
            "--rancher-url",
            "https://rancher.example.com",
            "--cluster",
            "c-1",
            "apply",
            "-f",
            "projects.yaml",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(
            cli.connection.rancher_url.as_deref(),
            Some("https://rancher.example.com")
        );
        match cli.command {
            Command::Apply(args) => {
                assert!(args.dry_run);
                assert_eq!(args.file.filename, PathBuf::from("projects.yaml"));
            }
            _ => panic!("Expected apply"),
        }
    }

    #[test]
    fn test_parse_get_json() {
        let cli = Cli::try_parse_from(["rancherctl", "get", "c-1:p-1", "-o", "json"]).unwrap();
        match cli.command {
            Command::Get(args) => {
                assert_eq!(args.id.as_deref(), Some("c-1:p-1"));
                assert_eq!(args.output, OutputFormat::Json);
            }
            _ => panic!("Expected get"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["rancherctl", "ls", "-vv", "--debug"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.debug);
    }

    #[test]
    fn test_groups_requires_project() {
        assert!(Cli::try_parse_from(["rancherctl", "groups"]).is_err());
    }
}
