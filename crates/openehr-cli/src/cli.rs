use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "openehr-aql")]
#[command(about = "Compile openEHR AQL query trees to PostgreSQL")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to ./openehr.toml when present)
    #[arg(short, long, global = true, env = "OPENEHR_CONFIG")]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a query tree (JSON) into a SQL statement
    Compile(CompileArgs),
    /// Print the resolved settings
    Settings,
    /// List the concrete classes an RM type stands for
    Classes(ClassesArgs),
}

#[derive(Args)]
pub struct CompileArgs {
    /// Query tree file (reads stdin when omitted or "-")
    pub file: Option<String>,

    /// JSON object file with parameter values
    #[arg(short, long)]
    pub params: Option<String>,

    /// Inline parameter (repeatable); the value is read as JSON, else as text
    #[arg(long = "param", value_name = "NAME=VALUE")]
    pub param: Vec<String>,
}

#[derive(Args)]
pub struct ClassesArgs {
    /// RM type name, e.g. DV_ORDERED or ENTRY
    pub model: String,

    /// List supertypes instead of subtypes
    #[arg(long)]
    pub supertypes: bool,
}
