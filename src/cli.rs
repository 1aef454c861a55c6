//! Command-line interface implementation for sectional.
//! Provides argument parsing and help text formatting using clap.

use clap::{error::ErrorKind, Args as ClapArgs, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};

/// Command-line arguments structure for sectional.
#[derive(Parser, Debug)]
#[command(author, version, about = "sectional: sectioned templates with a compile cache", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory searched for sectional.json / sectional.yml / sectional.yaml
    #[arg(long, global = true, value_name = "DIR")]
    pub config: Option<PathBuf>,

    /// Root for relative template references
    #[arg(long, global = true, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Root for compiled artifacts
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Always recompile instead of trusting the disk cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render one section of a template to stdout
    Render(RenderArgs),
    /// Delete section bodies no cached template refers to anymore
    Prune,
}

#[derive(ClapArgs, Debug)]
pub struct RenderArgs {
    /// Template path, relative to the base directory or absolute
    #[arg(value_name = "TEMPLATE")]
    pub template: String,

    /// Section to render instead of the main body
    #[arg(short = 'n', long, value_name = "NAME")]
    pub section: Option<String>,

    /// Template variable, may be repeated
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Read a JSON object of template variables from stdin
    #[arg(short, long)]
    pub stdin: bool,
}

impl Args {
    /// Applies command-line overrides on top of a loaded configuration.
    /// Relative directories given on the command line are taken from `cwd`.
    pub fn apply(&self, mut config: Config, cwd: &Path) -> Config {
        if let Some(base_dir) = &self.base_dir {
            config.base_dir = cwd.join(base_dir);
        }
        if let Some(cache_dir) = &self.cache_dir {
            config.cache_dir = Some(cwd.join(cache_dir));
        }
        if self.no_cache {
            config.disable_cache = true;
        }
        config
    }
}

/// Parses `--var KEY=VALUE` pairs into a JSON object.
///
/// # Errors
/// * `Error::ConfigError` if a pair has no `=` or an empty key
pub fn parse_vars(pairs: &[String]) -> Result<serde_json::Map<String, serde_json::Value>> {
    let mut vars = serde_json::Map::new();
    for pair in pairs {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                vars.insert(key.trim().to_string(), serde_json::Value::String(value.to_string()));
            }
            _ => {
                return Err(Error::ConfigError(format!(
                    "variable '{}' is not of the form KEY=VALUE",
                    pair
                )))
            }
        }
    }
    Ok(vars)
}

/// Parses command line arguments and returns the Args structure.
///
/// # Returns
/// * `Args` - Parsed command line arguments
///
/// # Exits
/// * With status code 1 if required arguments are missing
/// * With clap's default error handling for other argument errors
pub fn get_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if matches!(
                e.kind(),
                ErrorKind::MissingRequiredArgument
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                    | ErrorKind::MissingSubcommand
            ) {
                let _ = Args::command()
                    .help_template(
                        r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#,
                    )
                    .print_help();
                std::process::exit(1);
            } else {
                e.exit();
            }
        }
    }
}
