//! ResendForward - Dashboard entry point
//!
//! Usage: `resendforward [SEARCH]`, where SEARCH is the forwarding page query
//! string, e.g. `status=pending&timeRange=24h`.

use anyhow::{Context, Result};
use resendforward_common::config::{Config, LoggingConfig};
use resendforward_common::types::EventStatus;
use resendforward_core::{Dashboard, FilterState, LogNotifier, QueryState};
use resendforward_storage::{ForwardingEvent, PocketBaseStore};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting ResendForward dashboard...");

    // Connect to the backend
    let store = Arc::new(PocketBaseStore::new(&config.backend)?);
    match config.backend.credentials() {
        Some((identity, password)) => {
            store
                .auth_with_password(&config.backend.auth_collection, identity, password)
                .await
                .context("Backend login failed")?;
        }
        None => warn!("No backend credentials configured, requests are anonymous"),
    }

    let dashboard = Dashboard::new(store, Arc::new(LogNotifier), &config.polling);

    match dashboard.required_settings().await {
        Ok(settings) if !settings.is_configured => {
            let missing: Vec<&str> = settings.missing.iter().map(|k| k.label()).collect();
            warn!(
                "Forwarding is not configured, missing: {}",
                missing.join(", ")
            );
        }
        Ok(_) => info!("Resend API key and webhook secret are configured"),
        Err(e) => warn!("Could not check required settings: {}", e),
    }

    let search = std::env::args().nth(1).unwrap_or_default();
    let mut view = dashboard.forwarding_view(&search);
    info!(filters = %view.filters().encode(), "Watching forwarding events");
    describe_filters(&dashboard, view.filters()).await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("Failed to listen for shutdown signal")?;
                info!("Shutdown signal received");
                break;
            }
            state = view.refresh() => match state {
                Some(state) => report(&state),
                None => break,
            },
        }
    }

    info!("ResendForward dashboard stopped");

    Ok(())
}

/// Log the rule and event named in the URL, if any
async fn describe_filters(dashboard: &Dashboard, filters: &FilterState) {
    let (client, queries) = (dashboard.client(), dashboard.queries());

    let rule_id = filters.rule_id.as_deref().unwrap_or_default();
    match client.read(&queries.forwarding_rule(rule_id)).await {
        Ok(Some(rule)) => info!(
            rule = %rule.rule_name,
            enabled = rule.enabled,
            "Filtering by rule {} -> {}",
            rule.rule_email,
            rule.forward_to_email
        ),
        Ok(None) => {}
        Err(e) => warn!("Could not load rule {}: {}", rule_id, e),
    }

    let event_id = filters.event_id.as_deref().unwrap_or_default();
    match client.read(&queries.forwarding_event(event_id)).await {
        Ok(Some(event)) => info!(
            id = %event.id,
            status = %event.status,
            "Selected event: {}",
            event.subject
        ),
        Ok(None) => {}
        Err(e) => warn!("Could not load event {}: {}", event_id, e),
    }
}

fn report(state: &QueryState<Vec<ForwardingEvent>>) {
    if let Some(error) = &state.error {
        warn!("Showing last known events: {}", error);
    }
    let Some(events) = &state.data else {
        return;
    };

    let count = |status: EventStatus| events.iter().filter(|e| e.status == status).count();
    info!(
        total = events.len(),
        pending = count(EventStatus::Pending),
        sent = count(EventStatus::Sent),
        delivered = count(EventStatus::Delivered),
        failed = count(EventStatus::Failed),
        "Forwarding events refreshed"
    );

    for event in events.iter() {
        debug!(
            id = %event.id,
            status = %event.status,
            rule = event.rule_name().unwrap_or(&event.rule),
            from = %event.from,
            "{}",
            event.subject
        );
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_json() {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
