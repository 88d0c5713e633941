//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use volcast_devices::DiscoveredVolume;
use volcast_events::Event;
use volcast_fsops::{RunReport, StepReport, VolumeOutcome};

use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};

pub(crate) fn render_report(report: &RunReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let text = serde_json::to_string_pretty(report)
                .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
            println!("{text}");
        }
        OutputFormat::Table => {
            println!("run: {}", report.run_id);
            println!("source: {}", report.source_dir.display());
            println!("files: {}", report.total_files);
            println!(
                "{:<32} {:<16} {:>9} {:<10} {:<10} {:<10} RESULT",
                "VOLUME", "LABEL", "FILES", "DIRECTORY", "RELABEL", "FINALIZE"
            );
            for volume in &report.volumes {
                println!("{}", volume_row(volume));
                if let Some(failed) = volume.failed_file() {
                    let reason = failed.error.as_deref().unwrap_or("unknown error");
                    println!(
                        "  failed: {} after {} attempts ({reason})",
                        failed.file_name, failed.attempts
                    );
                }
                for step in [&volume.directory, &volume.relabel, &volume.finalize] {
                    if step.is_failed()
                        && let Some(detail) = &step.detail
                    {
                        println!("  error: {detail}");
                    }
                }
            }
            let failed = report.failed_volumes().count();
            println!(
                "{} of {} volumes succeeded",
                report.volumes.len() - failed,
                report.volumes.len()
            );
        }
    }
    Ok(())
}

pub(crate) fn render_volumes(volumes: &[DiscoveredVolume], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let text = serde_json::to_string_pretty(volumes)
                .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
            println!("{text}");
        }
        OutputFormat::Table => {
            if volumes.is_empty() {
                println!("no removable volumes found");
                return Ok(());
            }
            println!(
                "{:<32} {:<16} {:<16} {:<8} {:>10}",
                "MOUNT", "DEVICE", "LABEL", "FS", "SIZE"
            );
            for volume in volumes {
                println!(
                    "{:<32} {:<16} {:<16} {:<8} {:>10}",
                    volume.mount_point.display(),
                    volume.device.as_deref().unwrap_or("-"),
                    volume.label.as_deref().unwrap_or("-"),
                    volume.filesystem.as_deref().unwrap_or("-"),
                    volume.size_bytes.map_or_else(|| "-".to_string(), format_bytes),
                );
            }
        }
    }
    Ok(())
}

/// One stderr line per progress event.
pub(crate) fn format_event(event: &Event) -> String {
    match event {
        Event::RunStarted {
            run_id,
            total_files,
            volumes,
        } => format!("run {run_id}: {total_files} files onto {volumes} volumes"),
        Event::VolumeStarted { volume, index } => format!("[{volume}] started (volume {index})"),
        Event::FileCopied {
            volume,
            completed,
            total,
        } => format!("[{volume}] {completed}/{total} files copied"),
        Event::FileFailed {
            volume,
            file,
            attempts,
        } => format!("[{volume}] {file} failed after {attempts} attempts"),
        Event::VolumeFinished { volume, succeeded } => {
            format!("[{volume}] {}", outcome_word(*succeeded))
        }
        Event::RunFinished { run_id, succeeded } => {
            format!("run {run_id}: {}", outcome_word(*succeeded))
        }
    }
}

fn volume_row(volume: &VolumeOutcome) -> String {
    let files = format!("{}/{}", volume.copied(), volume.planned_files);
    let result = if volume.cancelled {
        "cancelled"
    } else {
        outcome_word(volume.is_success())
    };
    format!(
        "{:<32} {:<16} {:>9} {:<10} {:<10} {:<10} {result}",
        volume.target.identifier,
        volume.target.label,
        files,
        step_word(&volume.directory),
        step_word(&volume.relabel),
        step_word(&volume.finalize),
    )
}

const fn step_word(step: &StepReport) -> &'static str {
    step.status.as_str()
}

const fn outcome_word(succeeded: bool) -> &'static str {
    if succeeded { "succeeded" } else { "failed" }
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes_to_f64(bytes);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[allow(clippy::cast_precision_loss)]
const fn bytes_to_f64(value: u64) -> f64 {
    value as f64
}
