use std::path::PathBuf;

use anyhow::anyhow;
use tracing::debug;
use volcast_devices::{DiscoveredVolume, StaticDiscovery, VolumeDiscovery, platform_discovery};

use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};
use crate::output::render_volumes;

pub(crate) async fn handle_volumes(format: OutputFormat) -> CliResult<()> {
    let volumes = discover_volumes(Vec::new()).await?;
    render_volumes(&volumes, format)
}

/// Explicit mount roots win; otherwise the platform tool is asked. Discovery
/// spawns processes, so it runs on the blocking pool.
pub(crate) async fn discover_volumes(explicit: Vec<PathBuf>) -> CliResult<Vec<DiscoveredVolume>> {
    let discovery: Box<dyn VolumeDiscovery> = if explicit.is_empty() {
        platform_discovery().map_err(CliError::failure)?
    } else {
        Box::new(StaticDiscovery::new(explicit))
    };
    let volumes = tokio::task::spawn_blocking(move || discovery.discover())
        .await
        .map_err(|err| CliError::failure(anyhow!("volume discovery task failed: {err}")))?
        .map_err(CliError::failure)?;
    debug!(count = volumes.len(), "volumes resolved");
    Ok(volumes)
}
