use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "stencil",
    version,
    about = "Versioned prompt templates with typed parameters, workflows and remote evals"
)]
pub struct Cli {
    /// Config file (defaults apply when absent)
    #[arg(long, global = true, default_value = "stencil.yaml")]
    pub config: PathBuf,

    /// SQLite database; overrides the config file
    #[arg(long, global = true, env = "STENCIL_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List placeholders in template text with their inferred types
    Extract(ExtractArgs),
    /// Manage documents and their versions
    Doc(DocArgs),
    /// Evaluation sets, test cases and runs
    Eval(EvalArgs),
    /// Chain document renders
    Workflow(WorkflowArgs),
    Version,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct ExtractArgs {
    /// Read the template from a file
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Template text
    #[arg(long)]
    pub content: Option<String>,
}

#[derive(Args, Debug)]
pub struct DocArgs {
    #[command(subcommand)]
    pub cmd: DocCmd,
}

#[derive(Subcommand, Debug)]
pub enum DocCmd {
    Create(DocCreateArgs),
    Update(DocUpdateArgs),
    List,
    /// Show the version history, newest first
    History {
        slug: String,
    },
    /// Restore a previous version; always records a new version
    Restore {
        slug: String,
        version: u32,
    },
    /// Compare two versions
    Diff {
        slug: String,
        from: u32,
        to: u32,
    },
    Render(DocRenderArgs),
    /// Show declared parameters
    Params {
        slug: String,
    },
    Delete {
        slug: String,
    },
}

#[derive(Args, Debug)]
pub struct DocCreateArgs {
    #[arg(long)]
    pub name: String,

    /// File holding the template content
    #[arg(long)]
    pub file: PathBuf,

    #[arg(long)]
    pub slug: Option<String>,

    #[arg(long)]
    pub instructions: Option<String>,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

#[derive(Args, Debug)]
pub struct DocUpdateArgs {
    pub slug: String,

    #[arg(long)]
    pub name: Option<String>,

    /// New template content from a file
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[arg(long)]
    pub instructions: Option<String>,

    /// draft, active or archived
    #[arg(long)]
    pub status: Option<String>,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub temperature: Option<f64>,

    #[arg(long)]
    pub max_tokens: Option<u32>,
}

#[derive(Args, Debug)]
pub struct DocRenderArgs {
    pub slug: String,

    /// Value as key=value; repeatable
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Render a specific version instead of the current one
    #[arg(long)]
    pub version: Option<u32>,

    #[arg(long)]
    pub instructions: Option<String>,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Print the full rendered output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    #[command(subcommand)]
    pub cmd: EvalCmd,
}

#[derive(Subcommand, Debug)]
pub enum EvalCmd {
    /// Create an evaluation set for a document
    CreateSet {
        slug: String,
        #[arg(long)]
        name: String,
        /// exact_match, contains, regex or json_schema
        #[arg(long, default_value = "exact_match")]
        grader: String,
        /// Grader configuration as JSON
        #[arg(long)]
        grader_config: Option<String>,
    },
    /// Add one test case
    AddCase {
        set_id: i64,
        #[arg(long)]
        expected: String,
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Import test cases from a JSONL file of
    /// `{"input_variables", "expected_output", "description"}` records
    Import {
        set_id: i64,
        file: PathBuf,
    },
    /// Execute a run against the grading service
    Run {
        set_id: i64,
        /// Version to grade; defaults to the latest
        #[arg(long)]
        version: Option<u32>,
    },
    /// List runs of a set, newest first
    Runs {
        set_id: i64,
    },
}

#[derive(Args, Debug)]
pub struct WorkflowArgs {
    #[command(subcommand)]
    pub cmd: WorkflowCmd,
}

#[derive(Subcommand, Debug)]
pub enum WorkflowCmd {
    /// Save a workflow; every slug must name an existing document
    Save {
        name: String,
        /// Step as key=slug; repeatable
        #[arg(long = "step", value_name = "KEY=SLUG", required = true)]
        steps: Vec<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Run {
        name: String,
        #[arg(long, default_value = "")]
        input: String,
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
        /// Record each step and print a report
        #[arg(long)]
        steps: bool,
    },
    List,
}
