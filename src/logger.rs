//! Logger setup for the sectional binary.

/// Installs `env_logger` at debug level when `verbose`, info otherwise.
pub fn init_logger(verbose: bool) {
    env_logger::Builder::new()
        .filter_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();
}
