//! Daemon event loop
//!
//! Reads notifications one at a time and drives each through the
//! synchronizer before reading the next. Decode errors and dropped streams
//! lead to a reconnect; everything else ends the loop with an error.

use super::metrics;
use super::synchronizer::TicketSynchronizer;
use crate::integrations::TicketSystem;
use crate::stream::{EventSource, NotificationReader, StreamConsumer};
use crate::Result;
use std::future::Future;

/// Counters for one daemon run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DaemonStats {
    /// Notifications fully processed
    pub processed: u64,
    /// Reconnects after stream errors
    pub reconnects: u64,
}

/// The notification processing loop
pub struct Daemon<S, T> {
    consumer: StreamConsumer<S>,
    synchronizer: TicketSynchronizer<T>,
    stats: DaemonStats,
}

impl<S: EventSource, T: TicketSystem> Daemon<S, T> {
    pub fn new(consumer: StreamConsumer<S>, synchronizer: TicketSynchronizer<T>) -> Self {
        Self {
            consumer,
            synchronizer,
            stats: DaemonStats::default(),
        }
    }

    /// Run until SIGTERM/SIGINT or a fatal error
    pub async fn run(&mut self) -> Result<()> {
        #[cfg(unix)]
        let shutdown = {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = signal(SignalKind::terminate()).map_err(|e| {
                crate::Icinga2RtError::Other(format!("Failed to set up SIGTERM handler: {}", e))
            })?;
            let mut sigint = signal(SignalKind::interrupt()).map_err(|e| {
                crate::Icinga2RtError::Other(format!("Failed to set up SIGINT handler: {}", e))
            })?;

            async move {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
                    _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
                }
            }
        };

        #[cfg(not(unix))]
        let shutdown = async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl-C, shutting down");
            }
        };

        self.run_until(shutdown).await
    }

    /// Run until `shutdown` completes or a fatal error occurs
    ///
    /// `shutdown` is only polled while waiting for the next notification, so
    /// a notification that has been read is always processed completely.
    pub async fn run_until<F: Future<Output = ()>>(&mut self, shutdown: F) -> Result<()> {
        tokio::pin!(shutdown);

        self.update_cache_gauge();

        let mut reader = self.consumer.connect().await?;
        metrics::set_health_status(true);
        tracing::info!(queue = %self.consumer.subscription().queue, "Waiting for notifications");

        let result = loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => break Ok(()),
                next = reader.next_notification() => next,
            };

            match next {
                Ok(notification) => {
                    let outcome = match self.synchronizer.process(&notification).await {
                        Ok(outcome) => outcome,
                        Err(e) => break Err(e),
                    };
                    self.stats.processed += 1;
                    metrics::record_notification(outcome.as_str());
                    self.update_cache_gauge();
                }
                Err(e) if e.is_stream_recoverable() => {
                    tracing::warn!(error = %e, "Event stream failed, reconnecting");
                    self.stats.reconnects += 1;
                    metrics::record_reconnect(reconnect_reason(&e));
                    metrics::set_health_status(false);

                    reader = match self.consumer.connect().await {
                        Ok(reader) => reader,
                        Err(e) => break Err(e),
                    };
                    metrics::set_health_status(true);
                }
                Err(e) => break Err(e),
            }
        };

        metrics::set_health_status(false);
        tracing::info!(
            processed = self.stats.processed,
            reconnects = self.stats.reconnects,
            "Daemon stopped"
        );
        tracing::debug!(metrics = %metrics::encode_metrics(), "Final metrics");

        result
    }

    fn update_cache_gauge(&self) {
        match self.synchronizer.cache().len() {
            Ok(count) => metrics::set_cache_entries(count),
            Err(e) => tracing::warn!(error = %e, "Failed to count cache entries"),
        }
    }

    pub fn stats(&self) -> DaemonStats {
        self.stats
    }

    pub fn synchronizer(&self) -> &TicketSynchronizer<T> {
        &self.synchronizer
    }
}

fn reconnect_reason(error: &crate::Icinga2RtError) -> &'static str {
    match error {
        crate::Icinga2RtError::Decode(_) => "decode",
        crate::Icinga2RtError::StreamClosed => "closed",
        _ => "http",
    }
}
