//! sectional's main application entry point.
//! Handles command-line argument parsing and dispatches to the render and
//! prune commands.

use std::io::Read;

use sectional::{
    cli::{get_args, parse_vars, Args, Commands, RenderArgs},
    config::{load_config, Config},
    error::{default_error_handler, Error, Result},
    logger::init_logger,
    pipeline::Pipeline,
    renderer::MiniJinjaRenderer,
    store::ArtifactStore,
};

/// Main application entry point.
fn main() {
    let args = get_args();

    init_logger(args.verbose);

    if let Err(err) = run(args) {
        default_error_handler(err);
    }
}

/// Builds the effective configuration: config file first, flags on top.
fn get_config(args: &Args) -> Result<Config> {
    let cwd = std::env::current_dir()?;
    let config_dir = match &args.config {
        Some(dir) => cwd.join(dir),
        None => cwd.clone(),
    };
    Ok(args.apply(load_config(config_dir)?, &cwd))
}

/// Reads template variables from `--var` pairs and, if asked, stdin.
fn get_vars(render: &RenderArgs) -> Result<serde_json::Value> {
    let mut vars = serde_json::Map::new();
    if render.stdin {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        let buffer = buffer.trim();
        if !buffer.is_empty() {
            match serde_json::from_str::<serde_json::Value>(buffer)? {
                serde_json::Value::Object(map) => vars.extend(map),
                _ => {
                    return Err(Error::ConfigError(
                        "stdin must contain a JSON object".to_string(),
                    ))
                }
            }
        }
    }
    vars.extend(parse_vars(&render.vars)?);
    Ok(serde_json::Value::Object(vars))
}

/// Main application logic execution.
fn run(args: Args) -> Result<()> {
    let config = get_config(&args)?;

    match &args.command {
        Commands::Render(render) => {
            let vars = get_vars(render)?;
            let mut pipeline = Pipeline::new(config)?;
            let template = pipeline.template(&render.template, vars)?;
            let engine = MiniJinjaRenderer::new();
            let output = match &render.section {
                Some(section) => template.render_section(section, &engine)?,
                None => template.render(&engine)?,
            };
            println!("{}", output);
        }
        Commands::Prune => {
            let store = ArtifactStore::new(config.cache_root());
            let removed = store.prune()?;
            println!("Removed {} orphaned section file(s) from {}.", removed, store.root().display());
        }
    }
    Ok(())
}
