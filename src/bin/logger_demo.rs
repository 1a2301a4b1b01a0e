use tokengate::logger::*;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    debug!("hidden until the filter is reloaded");
    info!(component = "bootstrap", "logger ready");

    let config = LogConfig {
        filter: "tokengate=debug".to_string(),
    };
    logger.reload_from_config(&config)?;
    debug!(component = "demo", "debug visible for tokengate targets");
    warn!(user_id = "00000000-0000-0000-0000-000000000000", "sample security event");

    Ok(())
}
