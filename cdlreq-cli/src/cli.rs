use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Traceability validation and test coverage for medical software requirements"
)]
pub struct Cli {
    /// Project name to use from central registry
    #[clap(long, short = 'p', global = true)]
    pub project: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[clap(long, short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Register a project in the registry
    Register {
        /// Name of the project
        #[clap(long)]
        name: String,

        /// Path to the project root
        #[clap(long)]
        path: PathBuf,

        /// Description of the project
        #[clap(long)]
        description: Option<String>,

        /// Set this project as the default
        #[clap(long)]
        default: bool,
    },

    /// List registered projects
    List,

    /// Print the root of a registered project
    Path {
        /// The name of the project to lookup
        #[clap(long)]
        name: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the requirements layout with example records
    Init {
        /// Directory to initialize
        #[clap(long, short = 'd', default_value = ".")]
        directory: PathBuf,
    },

    /// Create a new requirement or specification file
    Create {
        /// Record kind (requirement, specification)
        kind: String,

        /// Record id; the REQ- or SPEC- prefix is added when missing
        #[clap(long)]
        id: String,

        #[clap(long)]
        title: String,

        #[clap(long)]
        description: Option<String>,

        /// Requirement type
        #[clap(long, default_value = "functional")]
        req_type: String,

        /// Acceptance criterion (requirements); repeat for several
        #[clap(long = "criterion")]
        criteria: Vec<String>,

        /// Tag (requirements); repeat for several
        #[clap(long = "tag")]
        tags: Vec<String>,

        /// Related requirement id (specifications); repeat for several
        #[clap(long = "requirement")]
        requirements: Vec<String>,

        /// Source file implementing the specification
        #[clap(long)]
        implementation_unit: Option<String>,

        /// Test target verifying the specification
        #[clap(long)]
        unit_test: Option<String>,

        /// File to write, relative to the project root (defaults to a path derived from the id)
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,

        /// Project root (defaults to the registry project or the current directory)
        #[clap(long, short = 'd')]
        directory: Option<PathBuf>,
    },

    /// Validate records and cross-references
    Validate {
        /// Project root (defaults to the registry project or the current directory)
        #[clap(long, short = 'd')]
        directory: Option<PathBuf>,

        /// Only report defects on requirements
        #[clap(long, short = 'r', conflicts_with = "specifications_only")]
        requirements_only: bool,

        /// Only report defects on specifications
        #[clap(long, short = 's')]
        specifications_only: bool,

        /// Output format (table, json, yaml)
        #[clap(long, short = 'f', default_value = "table")]
        format: String,
    },

    /// List requirements and specifications
    List {
        /// Project root (defaults to the registry project or the current directory)
        #[clap(long, short = 'd')]
        directory: Option<PathBuf>,

        /// Record type to list (requirements, specifications)
        #[clap(long, short = 't')]
        r#type: Option<String>,

        /// Output format (table, json, yaml)
        #[clap(long, short = 'f', default_value = "table")]
        format: String,
    },

    /// Show the requirement to specification traceability matrix
    Trace {
        /// Project root (defaults to the registry project or the current directory)
        #[clap(long, short = 'd')]
        directory: Option<PathBuf>,

        /// Output format (table, json, yaml)
        #[clap(long, short = 'f', default_value = "table")]
        format: String,

        /// Write the matrix to a file instead of stdout
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Reconcile declared unit tests against an executed-test list
    Coverage {
        /// File with one executed-test selector per line
        test_list: PathBuf,

        /// Project root (defaults to the registry project or the current directory)
        #[clap(long, short = 'd')]
        directory: Option<PathBuf>,

        /// Delimiter between test file and function in selectors
        #[clap(long)]
        delimiter: Option<String>,

        /// Minimum percentage of covered specifications
        #[clap(long)]
        fail_under: Option<f64>,

        /// Output format (table, json, yaml)
        #[clap(long, short = 'f', default_value = "table")]
        format: String,

        /// Write the report to a file instead of stdout
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Audit registered projects
    Audit {
        /// Projects to audit (all registered projects if omitted)
        #[clap(long = "name", short = 'n')]
        names: Vec<String>,

        /// Output format (table, json, yaml)
        #[clap(long, short = 'f', default_value = "table")]
        format: String,
    },

    /// Database (project registry) management
    #[clap(subcommand)]
    Db(DbCommand),
}
