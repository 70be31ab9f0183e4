//! Update engine: scheduler loop + change detection
//!
//! The engine ticks on a fixed interval. Each tick runs the consensus
//! resolver and compares the winning IP against the last value that was
//! successfully pushed to the DNS provider:
//!
//! ```text
//! tick ──► ConsensusResolver ──► winning IP ──► changed? ──► DnsProvider
//!              (fan-out to              │            │no
//!               IpFetcher)              │undetermined└─► skip (debug)
//!                                       └─► skip (warn)
//! ```
//!
//! Two invariants hold at all times:
//!
//! - the provider is never invoked with an IP equal to `last_ip`;
//! - `last_ip` changes only immediately after a provider call reported
//!   success. A failed update therefore leaves `last_ip` stale and the
//!   next tick retries the same change without any extra bookkeeping.
//!
//! `last_ip` is a private field of the engine and lives only for the
//! process lifetime: the first resolution after a restart is always
//! treated as a potential change.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::DdnsConfig;
use crate::consensus::ConsensusResolver;
use crate::error::Result;
use crate::record::{self, RecordKind};
use crate::traits::{DnsProvider, IpFamily, IpFetcher};

/// Capacity of the engine event channel; overflow drops events with a log
/// warning rather than growing without bound.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events emitted by the UpdateEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine entered its loop
    Started {
        sources: usize,
    },

    /// No source produced a usable answer this cycle
    CycleUndetermined,

    /// Resolved IP equals the last pushed one; nothing to do
    UpdateSkipped {
        ip: String,
    },

    /// Provider call is about to start
    UpdateStarted {
        ip: String,
    },

    /// Provider confirmed the record now points at `ip`
    UpdateSucceeded {
        ip: String,
    },

    /// Provider call failed; will retry on the next tick
    UpdateFailed {
        ip: String,
        error: String,
    },

    /// Engine left its loop
    Stopped {
        reason: String,
    },
}

/// The scheduler loop and the change detector around it.
///
/// ## Lifecycle
///
/// 1. Create with [`UpdateEngine::new()`]
/// 2. Start with [`UpdateEngine::run()`]
/// 3. Engine runs until a shutdown signal is received
///
/// All state is owned by the single scheduler task; nothing here needs
/// locking.
pub struct UpdateEngine {
    /// Source fetcher implementation
    fetcher: Box<dyn IpFetcher>,

    /// DNS provider implementation
    provider: Box<dyn DnsProvider>,

    /// Consensus over the configured sources
    resolver: ConsensusResolver,

    /// Tick period
    interval: std::time::Duration,

    /// Record type override from the configuration ("a"/"aaaa"/"auto")
    record_type: String,

    /// Last IP successfully pushed to the provider
    last_ip: Option<String>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl UpdateEngine {
    /// Create a new update engine.
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver); the receiver yields
    /// [`EngineEvent`]s and may be dropped if nobody cares.
    pub fn new(
        fetcher: Box<dyn IpFetcher>,
        provider: Box<dyn DnsProvider>,
        config: &DdnsConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let family = family_for_override(&config.record_type);
        let engine = Self {
            fetcher,
            provider,
            resolver: ConsensusResolver::new(config.ip_sources.clone(), family),
            interval: std::time::Duration::from_secs(config.update_interval_minutes * 60),
            record_type: config.record_type.clone(),
            last_ip: None,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// The last IP successfully pushed to the provider, if any
    pub fn last_ip(&self) -> Option<&str> {
        self.last_ip.as_deref()
    }

    /// Run the engine until SIGINT.
    ///
    /// The first tick fires immediately; callers that need to react to
    /// more than ctrl-c should use [`UpdateEngine::run_with_shutdown`] and
    /// provide their own signal plumbing.
    pub async fn run(&mut self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine until `shutdown_rx` fires (or SIGINT when `None`).
    ///
    /// The daemon uses this to funnel SIGTERM/SIGINT through one channel;
    /// tests use it for deterministic shutdown.
    pub async fn run_with_shutdown(
        &mut self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(
        &mut self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.emit_event(EngineEvent::Started {
            sources: self.resolver.sources().len(),
        });
        info!(
            "update loop started ({} sources, tick every {:?})",
            self.resolver.sources().len(),
            self.interval
        );

        let mut ticker = tokio::time::interval(self.interval);

        let reason = if let Some(mut rx) = shutdown_rx {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    _ = &mut rx => {
                        break "shutdown signal";
                    }
                }
            }
        } else {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    _ = tokio::signal::ctrl_c() => {
                        break "SIGINT";
                    }
                }
            }
        };

        info!("update loop stopping: {}", reason);
        self.emit_event(EngineEvent::Stopped {
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// Execute one scheduler tick: resolve, detect change, maybe update.
    ///
    /// Public so that callers can drive the cycle themselves (tests, or a
    /// one-shot invocation). A cycle never returns an error: every
    /// failure inside it is recoverable by the next tick.
    pub async fn run_once(&mut self) {
        let Some(ip) = self.resolver.resolve(self.fetcher.as_ref()).await else {
            warn!("failed to determine public IP this cycle");
            self.emit_event(EngineEvent::CycleUndetermined);
            return;
        };

        if self.last_ip.as_deref() == Some(ip.as_str()) {
            debug!("IP unchanged: {}", ip);
            self.emit_event(EngineEvent::UpdateSkipped { ip });
            return;
        }

        let addr = match ip.parse::<std::net::IpAddr>() {
            Ok(addr) => addr,
            Err(_) => {
                // Consensus can only produce this when every agreeing
                // source returned the same garbage; keep it away from the
                // provider and let the next cycle try again.
                warn!("resolved value {:?} is not an IP literal, skipping cycle", ip);
                self.emit_event(EngineEvent::CycleUndetermined);
                return;
            }
        };

        let kind = record::kind_for(&ip, &self.record_type);
        info!(
            "detected public IP {} ({} record)",
            ip,
            kind.dns_type().unwrap_or("?")
        );
        debug_assert_ne!(kind, RecordKind::Invalid);

        self.emit_event(EngineEvent::UpdateStarted { ip: ip.clone() });

        match self.provider.update_record(addr).await {
            Ok(outcome) => {
                info!(
                    "DNS record updated via {}: {:?}",
                    self.provider.provider_name(),
                    outcome
                );
                self.last_ip = Some(ip.clone());
                self.emit_event(EngineEvent::UpdateSucceeded { ip });
            }
            Err(e) => {
                // last_ip stays stale on purpose: the next tick sees the
                // same difference and retries.
                error!("DNS update failed: {}", e);
                self.emit_event(EngineEvent::UpdateFailed {
                    ip,
                    error: e.to_string(),
                });
            }
        }
    }

    fn emit_event(&self, event: EngineEvent) {
        use tokio::sync::mpsc::error::TrySendError;
        match self.event_tx.try_send(event) {
            Err(TrySendError::Full(_)) => warn!("event channel full, dropping engine event"),
            // A dropped receiver just means nobody is listening.
            Err(TrySendError::Closed(_)) | Ok(()) => {}
        }
    }
}

/// Network family implied by a record-type override, for transport pinning.
///
/// Forcing an A record on a dual-stack host only makes sense if the
/// discovery requests themselves go out over IPv4 (and vice versa for
/// AAAA); "auto" and anything unrecognized leave the choice to the OS.
fn family_for_override(record_type: &str) -> Option<IpFamily> {
    match record_type.to_ascii_lowercase().as_str() {
        "a" => Some(IpFamily::V4),
        "aaaa" => Some(IpFamily::V6),
        _ => None,
    }
}
