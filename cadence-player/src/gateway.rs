//! Voice transport seam
//!
//! Audio decoding and voice-channel plumbing live outside this crate. The
//! gateway carries three responsibilities the coordinator depends on:
//! starting/stopping sources, answering channel-membership questions for
//! capability checks and vote sizing, and signalling asynchronous triggers
//! (natural track completion, channel emptied) back into the coordinator's
//! per-tenant serialization point.

use crate::error::Result;
use async_trait::async_trait;
use cadence_common::{PrincipalId, StreamLocator, TenantId};
use tokio::sync::mpsc;

/// Asynchronous triggers flowing from the gateway into the coordinator.
///
/// These are inputs to the per-tenant transition, not preemptive interrupts:
/// the coordinator consumes them one at a time and discards the ones that
/// arrive after the session has already moved past them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEvent {
    /// The audio layer finished playing the source started with this
    /// sequence number. Stale sequence numbers are dropped.
    TrackEnded { tenant: TenantId, seq: u64 },

    /// The session's voice channel has no non-bot members left.
    ChannelEmpty { tenant: TenantId },
}

/// Cloneable handle for pushing gateway events into the coordinator.
///
/// Handed to the embedding layer at wiring time so voice-state listeners can
/// report emptied channels.
#[derive(Clone)]
pub struct GatewaySignals {
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl GatewaySignals {
    pub(crate) fn new(tx: mpsc::UnboundedSender<GatewayEvent>) -> Self {
        Self { tx }
    }

    /// Report that the tenant's voice channel lost its last non-bot member.
    pub fn channel_empty(&self, tenant: TenantId) {
        let _ = self.tx.send(GatewayEvent::ChannelEmpty { tenant });
    }

    pub(crate) fn track_end_handle(&self, tenant: TenantId, seq: u64) -> TrackEndHandle {
        TrackEndHandle {
            tenant,
            seq,
            tx: self.tx.clone(),
        }
    }
}

/// One-shot completion signal for a single started source.
///
/// The gateway fires it when the source finishes naturally. Firing after the
/// session has advanced is harmless: the embedded sequence number no longer
/// matches and the signal is dropped.
pub struct TrackEndHandle {
    tenant: TenantId,
    seq: u64,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl TrackEndHandle {
    pub fn fire(self) {
        let _ = self.tx.send(GatewayEvent::TrackEnded {
            tenant: self.tenant,
            seq: self.seq,
        });
    }

    pub fn tenant(&self) -> TenantId {
        self.tenant
    }
}

/// External voice transport interface.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Join the channel appropriate for the tenant's session.
    async fn connect(&self, tenant: TenantId) -> Result<()>;

    /// Leave the tenant's voice channel.
    async fn disconnect(&self, tenant: TenantId) -> Result<()>;

    /// Start playing a source at the given volume (percent). `on_end` must
    /// be fired exactly once if and when the source finishes on its own.
    async fn begin(
        &self,
        tenant: TenantId,
        locator: &StreamLocator,
        volume: u16,
        on_end: TrackEndHandle,
    ) -> Result<()>;

    /// Pause the current source.
    async fn pause(&self, tenant: TenantId) -> Result<()>;

    /// Resume the paused source.
    async fn resume(&self, tenant: TenantId) -> Result<()>;

    /// Stop the current source without firing its completion signal. The
    /// coordinator drives the state advance itself on explicit stops/skips.
    async fn halt(&self, tenant: TenantId) -> Result<()>;

    /// Adjust the live source volume (percent).
    async fn set_volume(&self, tenant: TenantId, volume: u16) -> Result<()>;

    /// Whether a voice connection exists for the tenant.
    fn is_connected(&self, tenant: TenantId) -> bool;

    /// Non-bot members in the session's voice channel, for vote sizing.
    fn listener_count(&self, tenant: TenantId) -> usize;

    /// Whether the principal shares a voice channel with the session. When
    /// no session channel exists yet, whether the principal occupies a
    /// channel the gateway could join.
    fn shares_channel(&self, tenant: TenantId, principal: PrincipalId) -> bool;
}
