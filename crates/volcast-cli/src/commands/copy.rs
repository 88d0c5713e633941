use std::sync::Arc;

use anyhow::anyhow;
use tracing::{info, warn};
use volcast_config::{CopyPolicy, VolcastConfig};
use volcast_devices::platform_labeler;
use volcast_events::EventBus;
use volcast_fsops::{
    CancelToken, CopyOrchestrator, CopyRequest, LocalVolume, RunReport, VolumeHandle,
};
use volcast_telemetry::Metrics;

use crate::cli::{CopyArgs, OutputFormat, effective_policy};
use crate::commands::volumes::discover_volumes;
use crate::error::{CliError, CliResult};
use crate::output::{format_event, render_report};

pub(crate) async fn handle_copy(
    config: &VolcastConfig,
    args: CopyArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let policy = effective_policy(config, &args)?;
    let volumes = discover_volumes(args.volumes).await?;

    let labeler = platform_labeler();
    let handles: Vec<Arc<dyn VolumeHandle>> = volumes
        .into_iter()
        .map(|volume| {
            Arc::new(LocalVolume::new(volume.mount_point).with_labeler(Arc::clone(&labeler)))
                as Arc<dyn VolumeHandle>
        })
        .collect();
    let request = CopyRequest {
        source_dir: args.source,
        new_name: args.name,
        volumes: handles,
    };

    let metrics = Metrics::new().map_err(CliError::failure)?;
    let report = execute_with_progress(policy, metrics.clone(), request).await?;
    render_report(&report, format)?;

    // Metrics go to stderr so JSON on stdout stays parseable.
    if args.print_metrics {
        let text = metrics.render().map_err(CliError::failure)?;
        eprint!("{text}");
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::Partial {
            failed: report.failed_volumes().count(),
            total: report.volumes.len(),
        })
    }
}

/// Run the pipeline on the blocking pool while a task prints progress lines
/// from the event bus. Ctrl-C cancels between files.
async fn execute_with_progress(
    policy: CopyPolicy,
    metrics: Metrics,
    request: CopyRequest,
) -> CliResult<RunReport> {
    let bus = EventBus::new();
    let mut stream = bus.subscribe(None);
    let printer = tokio::spawn(async move {
        while let Some(envelope) = stream.next().await {
            eprintln!("{}", format_event(&envelope.event));
        }
    });

    let cancel = CancelToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; stopping after the current file");
                cancel.cancel();
            }
        })
    };

    // The orchestrator owns the last bus handle; dropping it with the blocking
    // task ends the progress stream.
    let orchestrator = CopyOrchestrator::new(policy, metrics)
        .with_sink(Arc::new(bus))
        .with_cancel_token(cancel);
    let result = tokio::task::spawn_blocking(move || orchestrator.execute(&request)).await;
    interrupt.abort();
    if let Err(err) = printer.await {
        warn!(error = %err, "progress printer stopped early");
    }

    let report = result.map_err(|err| CliError::failure(anyhow!("copy task failed: {err}")))??;
    info!(
        run_id = %report.run_id,
        succeeded = report.is_success(),
        cancelled = report.was_cancelled(),
        "copy run finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::path::PathBuf;
    use volcast_test_support::fixtures::{is_read_only, source_tree, volume_roots};

    fn args_for(source: PathBuf, volumes: Vec<PathBuf>) -> CopyArgs {
        CopyArgs {
            source,
            name: "SHOW".into(),
            volumes,
            backoff_ms: Some(0),
            ..CopyArgs::default()
        }
    }

    #[tokio::test]
    async fn copies_onto_explicit_volumes_without_relabel() -> Result<()> {
        let source = source_tree(&[("a.txt", "alpha"), ("b.txt", "beta")])?;
        let roots = volume_roots(2)?;
        let mut args = args_for(
            source.path().to_path_buf(),
            roots.iter().map(|root| root.path().to_path_buf()).collect(),
        );
        args.no_relabel = true;

        handle_copy(&VolcastConfig::default(), args, OutputFormat::Json)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;

        for root in &roots {
            let copied = root.path().join("SHOW").join("b.txt");
            assert_eq!(std::fs::read_to_string(&copied)?, "beta");
            assert!(is_read_only(&copied)?);
        }
        Ok(())
    }

    #[tokio::test]
    async fn relabelling_plain_directories_is_a_partial_run() -> Result<()> {
        let source = source_tree(&[("a.txt", "alpha")])?;
        let roots = volume_roots(1)?;
        let args = args_for(
            source.path().to_path_buf(),
            vec![roots[0].path().to_path_buf()],
        );

        let err = handle_copy(&VolcastConfig::default(), args, OutputFormat::Table).await;
        assert!(matches!(err, Err(CliError::Partial { failed: 1, total: 1 })));
        assert!(roots[0].path().join("SHOW").join("a.txt").exists());
        Ok(())
    }

    #[tokio::test]
    async fn missing_source_is_a_validation_error() -> Result<()> {
        let roots = volume_roots(1)?;
        let args = args_for(
            roots[0].path().join("does-not-exist"),
            vec![roots[0].path().to_path_buf()],
        );

        let err = handle_copy(&VolcastConfig::default(), args, OutputFormat::Table).await;
        assert!(matches!(&err, Err(error) if error.exit_code() == 2));
        assert!(!roots[0].path().join("SHOW").exists());
        Ok(())
    }
}
