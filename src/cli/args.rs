//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shelf - shared offline cache for multi-app deployments
///
/// Preloads, serves and reclaims per-app cache partitions that many
/// independently versioned web apps share behind one interception layer.
#[derive(Parser, Debug)]
#[command(name = "shelf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SHELF_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Preload every declared partition
    Install,

    /// Reclaim stale partitions and start serving
    Activate,

    /// Install and activate in one step
    Update,

    /// Show lifecycle state and partitions
    Status(StatusArgs),

    /// Request a resource through the interception layer
    Fetch(FetchArgs),

    /// Show which partition owns a request path
    Resolve(ResolveArgs),

    /// Inspect or delete cache partitions
    Partitions(PartitionsArgs),

    /// Manage an app's record store
    Records(RecordsArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// URL or origin-relative path
    pub target: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Print response headers before the body
    #[arg(short, long)]
    pub include: bool,

    /// Write the body to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Request path, e.g. /User-Manager/index.html
    pub path: String,

    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct PartitionsArgs {
    #[command(subcommand)]
    pub action: PartitionAction,
}

#[derive(Subcommand, Debug)]
pub enum PartitionAction {
    /// List partitions in creation order
    List {
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List the entries of one partition
    Show {
        name: String,

        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete a partition
    Delete {
        name: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Parser, Debug)]
pub struct RecordsArgs {
    /// Record store name (one per app)
    #[arg(short, long, default_value = "records")]
    pub store: String,

    #[command(subcommand)]
    pub action: RecordAction,
}

#[derive(Subcommand, Debug)]
pub enum RecordAction {
    /// Add a record from KEY=VALUE fields
    Add {
        #[arg(required = true, value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Show one record
    Get { id: u64 },

    /// Set fields on an existing record
    Update {
        id: u64,

        #[arg(required = true, value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Delete a record
    Delete { id: u64 },

    /// List all records
    List {
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Parse a record field in KEY=VALUE format
fn parse_field(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE format: no '=' found in '{s}'"))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE format: empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_valid() {
        assert_eq!(
            parse_field("name=Alice").unwrap(),
            ("name".to_string(), "Alice".to_string())
        );
        assert_eq!(parse_field("expr=a=b").unwrap().1, "a=b");
    }

    #[test]
    fn parse_field_invalid() {
        assert!(parse_field("name").is_err());
        assert!(parse_field("=x").is_err());
    }

    #[test]
    fn cli_parses_fetch() {
        let cli = Cli::parse_from(["shelf", "fetch", "/User-Manager/index.html", "-i"]);
        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.target, "/User-Manager/index.html");
                assert_eq!(args.method, "GET");
                assert!(args.include);
            }
            _ => panic!("expected Fetch command"),
        }
    }

    #[test]
    fn cli_parses_records() {
        let cli = Cli::parse_from(["shelf", "records", "--store", "users", "add", "name=Bob"]);
        match cli.command {
            Commands::Records(args) => {
                assert_eq!(args.store, "users");
                match args.action {
                    RecordAction::Add { fields } => {
                        assert_eq!(fields, vec![("name".to_string(), "Bob".to_string())])
                    }
                    _ => panic!("expected Add action"),
                }
            }
            _ => panic!("expected Records command"),
        }
    }

    #[test]
    fn cli_parses_partitions_delete() {
        let cli = Cli::parse_from(["shelf", "partitions", "delete", "appA-cache-v1", "-y"]);
        match cli.command {
            Commands::Partitions(PartitionsArgs {
                action: PartitionAction::Delete { name, yes },
            }) => {
                assert_eq!(name, "appA-cache-v1");
                assert!(yes);
            }
            _ => panic!("expected Partitions delete"),
        }
    }

    #[test]
    fn cli_verbose_levels() {
        let cli = Cli::parse_from(["shelf", "install"]);
        assert_eq!(cli.verbose, 0);

        let cli = Cli::parse_from(["shelf", "-vv", "install"]);
        assert_eq!(cli.verbose, 2);
    }
}
