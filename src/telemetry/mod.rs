use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Installs the global tracing subscriber.
///
/// Filtering follows `RUST_LOG` (default `info`); `LOG_FORMAT=json` switches
/// to one JSON object per event.
pub fn init() -> anyhow::Result<()> {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    init_with(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?, json)
}

pub fn init_with(filter: EnvFilter, json: bool) -> anyhow::Result<()> {
    Registry::default()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer().compact()))
        .try_init()?;
    Ok(())
}
