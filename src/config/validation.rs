use crate::config::CrawlOptions;
use crate::ConfigError;

/// Rejects contradictory options before any worker is started
///
/// Per-page problems are data; configuration problems are fatal and
/// abort the run here.
pub fn validate(options: &CrawlOptions) -> Result<(), ConfigError> {
    if options.effective_workers() == 0 {
        return Err(ConfigError::NoWorkers);
    }

    if options.timeout_secs == 0 {
        return Err(ConfigError::ZeroTimeout);
    }

    if options.types.is_empty() {
        return Err(ConfigError::NoTypes);
    }

    for (name, _) in &options.headers {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_graphic() && c != ':') {
            return Err(ConfigError::BadHeader(name.clone()));
        }
    }

    Ok(())
}
