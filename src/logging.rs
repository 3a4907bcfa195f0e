use time::UtcOffset;
use tracing_subscriber::{
    fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

use crate::config::LoggingConfig;
use crate::errors::{ClientError, ConfigValidationError};

/// Initializes a console tracing subscriber from the logging config.
/// Embedding applications with their own subscriber skip this entirely.
pub fn init(config: &LoggingConfig) -> Result<(), ClientError> {
    config.validate()?;

    let timer = OffsetTime::new(
        UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        time::format_description::well_known::Rfc3339,
    );

    let base_level = config.level_filter();
    let mut env_filter = EnvFilter::default().add_directive(base_level.into());

    // Frame hex dumps live at trace level in the transport and frame
    // modules; surface them without flooding everything else.
    if config.trace_frames {
        env_filter = env_filter
            .add_directive("modbus_master::transport=trace".parse().unwrap())
            .add_directive("modbus_master::frame=trace".parse().unwrap());
    }

    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(config.thread_ids)
        .with_thread_names(config.thread_names)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_level(true)
        .with_timer(timer)
        .with_filter(env_filter);

    Registry::default().with(layer).try_init().map_err(|e| {
        ClientError::Config(ConfigValidationError::logging(format!(
            "Failed to initialize logging: {}",
            e
        )))
    })?;

    Ok(())
}
