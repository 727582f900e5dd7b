mod cli;
mod observability;
mod output;

use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;
use openehr_aql::config::loader;
use openehr_aql::{ModelTypeResolver, ParamValue, Parameters, Query, QueryCompiler};
use tracing::debug;

use cli::{ClassesArgs, Cli, Commands, CompileArgs, OutputFormat};
use output::print_error;

fn main() {
    if let Err(e) = run() {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();
    let settings = loader::load_settings(cli.config.as_deref())?;
    observability::init_tracing_with_level(&settings.logging.level);

    match &cli.command {
        Commands::Compile(args) => compile(args, QueryCompiler::new(settings.aql)?, format)?,
        Commands::Settings => output::print_settings(&settings, format)?,
        Commands::Classes(args) => classes(args, format)?,
    }
    Ok(())
}

fn compile(args: &CompileArgs, compiler: QueryCompiler, format: OutputFormat) -> Result<()> {
    let source = match args.file.as_deref() {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read query from stdin")?;
            buf
        }
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?
        }
    };
    let query: Query = serde_json::from_str(&source).context("invalid query tree")?;
    let params = load_params(args)?;
    debug!(params = params.len(), "compiling query");

    let compiled = compiler.compile(&query, &params)?;
    output::print_compiled(&compiled, format)?;
    if matches!(format, OutputFormat::Text) {
        output::print_success(&format!(
            "Compiled {} column(s)",
            compiled.column_names.len()
        ));
    }
    Ok(())
}

fn load_params(args: &CompileArgs) -> Result<Parameters> {
    let mut params = match args.params.as_deref() {
        Some(path) => {
            let raw =
                std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
            serde_json::from_str::<Parameters>(&raw)
                .with_context(|| format!("{path} must be a JSON object of scalar values"))?
        }
        None => Parameters::new(),
    };
    for entry in &args.param {
        let (name, raw) = entry
            .split_once('=')
            .with_context(|| format!("expected NAME=VALUE, got '{entry}'"))?;
        let value = serde_json::from_str::<ParamValue>(raw)
            .unwrap_or_else(|_| ParamValue::String(raw.to_string()));
        params.insert(name.trim_start_matches('$'), value);
    }
    Ok(params)
}

fn classes(args: &ClassesArgs, format: OutputFormat) -> Result<()> {
    let classes: Vec<String> = if args.supertypes {
        ModelTypeResolver::reverse_closure(&args.model)
    } else {
        ModelTypeResolver::closure(&args.model)
    }
    .into_iter()
    .collect();
    output::print_classes(&args.model, &classes, format)
}
