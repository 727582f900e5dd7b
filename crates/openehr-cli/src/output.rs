use anyhow::Result;
use colored::Colorize;
use openehr_aql::{CompiledQuery, Settings};

use crate::cli::OutputFormat;

pub fn print_compiled(compiled: &CompiledQuery, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(compiled)?);
        }
        OutputFormat::Text => {
            println!("{}", compiled.sql);
            eprintln!("{}", "Columns:".cyan());
            for (i, name) in compiled.column_names.iter().enumerate() {
                eprintln!("  {i}: {name}");
            }
        }
    }
    Ok(())
}

pub fn print_settings(settings: &Settings, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(settings)?),
        OutputFormat::Text => print!("{}", toml::to_string_pretty(settings)?),
    }
    Ok(())
}

pub fn print_classes(model: &str, classes: &[String], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(classes)?),
        OutputFormat::Text => {
            println!("{} {}", "Model:".cyan(), model.cyan());
            for class in classes {
                println!("  {class}");
            }
        }
    }
    Ok(())
}

pub fn print_success(msg: &str) {
    eprintln!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}
