use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

// Import modules
mod activity;
mod config;
mod logger;
mod spammer;
mod stats;
mod transport;

use activity::OutcomeKind;
use config::{FileAttachment, SpamConfig, SpamSettings};
use spammer::WebhookSpammer;
use stats::StatsHandler;
use transport::HttpTransport;

#[tokio::main]
async fn main() {
    logger::init_log_level_from_env("WEBHOOK_LOG");

    log_info!("🌐 Webhook Spammer Tool");
    log_info!("=======================");
    log_info!("📝 Repeatedly POSTs a message or file to a webhook endpoint");
    log_info!("");

    let config = match std::env::args().nth(1) {
        Some(path) => match SpamConfig::load(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                log_error!("{e:#}");
                std::process::exit(1);
            }
        },
        None => {
            log_warn!("No config file given, using the built-in sample configuration");
            SpamConfig::default()
        }
    };

    log_info!("📋 Configuration:");
    log_info!("  Webhook URL: {}", config.webhook_url);
    log_info!("  Target: {}", config.target());
    log_info!("  Delay: {}ms", config.delay_ms);
    match &config.file_path {
        Some(path) => log_info!("  Payload: file {}", path.display()),
        None => log_info!("  Payload: text ({} chars)", config.message.chars().count()),
    }
    log_info!("");

    let attachment = match load_attachment(&config) {
        Ok(attachment) => attachment,
        Err(e) => {
            log_error!("{e:#}");
            std::process::exit(1);
        }
    };

    let transport = match HttpTransport::new() {
        Ok(transport) => Arc::new(transport),
        Err(e) => {
            log_error!("{e:#}");
            std::process::exit(1);
        }
    };

    let unlimited = config.unlimited;
    let spammer = Arc::new(WebhookSpammer::new(transport));
    spammer
        .configure(SpamSettings::from_config(&config, None))
        .await;
    if let Some(file) = attachment {
        spammer.attach_file(file.name, file.bytes).await;
    }

    if !spammer.start().await {
        // start was refused; the activity log says why
        dump_recent_activity(&spammer).await;
        std::process::exit(1);
    }

    log_info!("Press Ctrl+C to stop...");

    // live statistics, the CLI stand-in for the web dashboard
    let reporter = tokio::spawn({
        let spammer = Arc::clone(&spammer);
        async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(5));
            loop {
                ticker.tick().await;
                let stats = spammer.stats().await;
                if !stats.running {
                    break;
                }
                log_info!(
                    "📈 {} sent, {} failed, {} planned, success rate {}%",
                    stats.sent,
                    stats.failed,
                    stats.total_planned,
                    stats.success_rate()
                );
            }
        }
    });

    if unlimited {
        let _ = tokio::signal::ctrl_c().await;
        if spammer.is_running().await {
            spammer.stop().await;
        }
    } else {
        tokio::select! {
            _ = spammer.await_completion() => {}
            _ = tokio::signal::ctrl_c() => {
                spammer.stop().await;
            }
        }
    }

    // let in-flight outcomes land before reporting
    spammer.await_completion().await;
    reporter.abort();

    let stats = spammer.stats().await;
    StatsHandler::print_final_stats(&stats);
    dump_recent_activity(&spammer).await;
}

fn load_attachment(config: &SpamConfig) -> anyhow::Result<Option<FileAttachment>> {
    let Some(path) = &config.file_path else {
        return Ok(None);
    };
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read payload file {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "payload.bin".to_string());
    Ok(Some(FileAttachment { name, bytes }))
}

async fn dump_recent_activity(spammer: &WebhookSpammer) {
    let recent = spammer.recent_activity(10).await;
    if recent.is_empty() {
        return;
    }
    log_info!("");
    log_info!("🗒️ Recent Activity (latest {}):", recent.len());
    for entry in recent {
        let marker = match entry.kind {
            OutcomeKind::Success => "✅",
            OutcomeKind::Failure => "❌",
        };
        log_info!(
            "  [{}] {} {}",
            entry.timestamp.format("%H:%M:%S"),
            marker,
            entry.message
        );
    }
}
