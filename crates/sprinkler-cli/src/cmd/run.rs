use anyhow::{Context, Result};
use sprinkler_core::{
    lifecycle, ActuationController, AuditLogger, Config, DocumentSource, DryRunSink,
    FsBlobStore, OutputSink, SysfsGpio, RELAY_PIN,
};
use std::path::Path;
use std::sync::Arc;

pub fn run(config_path: &Path, dry_run: bool) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let dry_run = dry_run || config.output.dry_run;
    tracing::info!(config = %config_path.display(), dry_run, "starting relay controller");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let sink: Box<dyn OutputSink> = if dry_run {
            Box::new(DryRunSink)
        } else {
            let gpio = SysfsGpio::open(&config.output.gpio_root, RELAY_PIN).with_context(|| {
                format!(
                    "failed to set up gpio{RELAY_PIN} under {}",
                    config.output.gpio_root.display()
                )
            })?;
            Box::new(gpio)
        };

        let store = Arc::new(FsBlobStore::new(&config.audit.store_dir));
        let audit = Arc::new(AuditLogger::new(store, config.audit.key.clone()));
        let source = Arc::new(DocumentSource::new(
            &config.document.path,
            config.document.poll_interval(),
        ));
        let controller = ActuationController::new(sink, audit, source.clone());

        tracing::info!(
            document = %source.path().display(),
            audit_key = %config.audit.key,
            dry_run,
            "listening for document changes"
        );

        let summary =
            lifecycle::run(&controller, source.subscribe(), lifecycle::shutdown_signal()).await;
        tracing::info!(
            handled = summary.handled,
            rejected = summary.rejected,
            "stopped"
        );
        Ok::<(), anyhow::Error>(())
    })
}
