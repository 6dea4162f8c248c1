#[macro_use]
extern crate log;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use schemaform::{
    FormConfig,
    data::AppData,
    run::{describe_data_source, describe_refs, render_fields},
};

#[derive(Parser)]
#[command(name = "schemaform", version, about = "Inspect the form generated from a JSON Schema")]
struct Cli {
    /// Settings file (defaults to `<schema>-form.toml` next to the schema)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the fields of the form, highest priority first
    Fields {
        /// Path to the schema file
        schema: PathBuf,
        /// Open a nested creation context for this field; repeat to go deeper
        #[arg(long = "open")]
        open: Vec<String>,
    },
    /// Show the references and nested objects found in the schema
    Refs {
        /// Path to the schema file
        schema: PathBuf,
    },
    /// Print the JSON Schema of the settings file
    ConfigSchema,
}

fn load(schema: &Path, config: Option<&PathBuf>) -> Result<AppData> {
    let app = AppData::new(schema, config)?;
    if let Some(path) = &app.config_path {
        debug!("settings from {}", path.display());
    }
    Ok(app)
}

fn heading(app: &AppData, schema: &Path) -> String {
    let title = app.root_title();
    if title.is_empty() {
        schema.display().to_string()
    } else {
        title
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Fields { schema, open } => {
            let mut app = load(&schema, cli.config.as_ref())?;
            println!("{}", heading(&app, &schema).bold());

            let form = app
                .form_mut()
                .with_context(|| format!("No form generated from {}", schema.display()))?;
            for name in &open {
                let depth = form
                    .request_create(name)
                    .with_context(|| format!("Cannot open {name}"))?;
                let title = form
                    .active_context()
                    .map(|c| c.title.clone())
                    .unwrap_or_default();
                println!(
                    "{}",
                    format!("{:indent$}> {title} (depth {depth})", "", indent = (depth - 1) * 2)
                        .cyan()
                );
            }
            print!("{}", render_fields(form));
            print!("{}", form.data_source().with(describe_data_source));
        }
        Commands::Refs { schema } => {
            let app = load(&schema, cli.config.as_ref())?;
            println!("{}", heading(&app, &schema).bold());
            let form = app
                .form()
                .with_context(|| format!("No form generated from {}", schema.display()))?;
            print!("{}", describe_refs(&form.root_form().output));

            let cycles = form
                .root_form()
                .fields()
                .iter()
                .filter(|f| f.is_cycle())
                .count();
            if cycles > 0 {
                println!("{}", format!("{cycles} circular reference(s)").yellow());
            }
        }
        Commands::ConfigSchema => {
            let schema = FormConfig::json_schema()?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }
    Ok(())
}
