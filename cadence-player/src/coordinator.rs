//! Playback coordinator
//!
//! The crate's core: owns every tenant session, serializes all mutation per
//! tenant behind a session lock, drives the state machine transitions, and
//! applies the vote gate in front of each contested action.
//!
//! Two input paths converge here. Command methods (`play`, `skip`, ...) are
//! called by the presentation layer with a normalized [`ActionRequest`];
//! asynchronous gateway triggers (track completion, emptied channel) arrive
//! on an unbounded channel and are consumed one at a time by the pump task
//! spawned from [`Coordinator::start`]. Both paths take the same per-tenant
//! lock, so a completion signal can never interleave with a command halfway
//! through its transition.
//!
//! Queue mutations are write-through: the mutated queue is persisted before
//! the in-memory copy is committed, so a command never reports success for a
//! change that did not reach the database.

use crate::config::Config;
use crate::db;
use crate::error::{Error, Result};
use crate::gateway::{GatewayEvent, GatewaySignals, VoiceGateway};
use crate::request::{ActionRequest, QueueView, Reply, TrackInfo};
use crate::resolver::TrackResolver;
use crate::session::{ActiveTrack, SessionState, TenantSession};
use crate::votes::{simple_majority, SubKey, ThresholdFn, VoteOutcome};
use cadence_common::{
    ActionKind, DisconnectReason, EventBus, LoopMode, PlayableItem, PlayerEvent, StreamLocator,
    TenantId,
};
use chrono::Utc;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Maximum accepted volume (percent).
pub const MAX_VOLUME: u16 = 200;

/// Multi-tenant playback coordinator.
pub struct Coordinator {
    db: Pool<Sqlite>,
    resolver: Arc<dyn TrackResolver>,
    gateway: Arc<dyn VoiceGateway>,
    events: Arc<EventBus>,
    config: Config,
    threshold: ThresholdFn,
    sessions: RwLock<HashMap<TenantId, Arc<Mutex<TenantSession>>>>,
    signal_tx: mpsc::UnboundedSender<GatewayEvent>,
    /// Receiver half, handed to the pump task on `start`.
    signal_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<GatewayEvent>>>,
}

impl Coordinator {
    pub fn new(
        db: Pool<Sqlite>,
        resolver: Arc<dyn TrackResolver>,
        gateway: Arc<dyn VoiceGateway>,
        config: Config,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Self {
            db,
            resolver,
            gateway,
            events: Arc::new(EventBus::new(config.event_capacity)),
            config,
            threshold: simple_majority,
            sessions: RwLock::new(HashMap::new()),
            signal_tx,
            signal_rx: std::sync::Mutex::new(Some(signal_rx)),
        }
    }

    /// Replace the vote-threshold formula.
    pub fn with_threshold(mut self, threshold: ThresholdFn) -> Self {
        self.threshold = threshold;
        self
    }

    /// Handle for pushing gateway triggers into the coordinator. The same
    /// sender backs the completion handles issued to the gateway, so
    /// ordering between the two trigger kinds is preserved per tenant.
    pub fn signals(&self) -> GatewaySignals {
        GatewaySignals::new(self.signal_tx.clone())
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    /// The underlying event bus, for embedders that fan it out elsewhere.
    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    /// Spawn the trigger pump and the inactivity ticker. Call once after
    /// construction; a second call is an error.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let rx = self
            .signal_rx
            .lock()
            .map_err(|_| Error::InvalidState("signal receiver lock poisoned".to_string()))?
            .take()
            .ok_or_else(|| Error::InvalidState("coordinator already started".to_string()))?;

        let pump = Arc::clone(self);
        tokio::spawn(async move { pump.run(rx).await });

        let ticker = Arc::clone(self);
        tokio::spawn(async move { ticker.inactivity_loop().await });

        info!(
            poll_secs = self.config.inactivity_poll_secs,
            timeout_secs = self.config.inactivity_timeout_secs,
            "coordinator started"
        );
        Ok(())
    }

    async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<GatewayEvent>) {
        while let Some(event) = rx.recv().await {
            let result = match event {
                GatewayEvent::TrackEnded { tenant, seq } => {
                    self.handle_track_end(tenant, seq).await
                }
                GatewayEvent::ChannelEmpty { tenant } => {
                    self.teardown(tenant, DisconnectReason::ChannelEmpty).await
                }
            };
            if let Err(e) = result {
                error!(error = %e, ?event, "failed to process gateway trigger");
            }
        }
        debug!("gateway trigger channel closed, pump exiting");
    }

    async fn inactivity_loop(self: Arc<Self>) {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.config.inactivity_poll_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep_inactive().await {
                error!(error = %e, "inactivity sweep failed");
            }
        }
    }

    /// One inactivity-ticker pass: tear down every connected session that
    /// has been quiet past the configured timeout.
    pub async fn sweep_inactive(&self) -> Result<()> {
        let timeout = Duration::from_secs(self.config.inactivity_timeout_secs);
        let tenants: Vec<TenantId> = self.sessions.read().await.keys().copied().collect();
        for tenant in tenants {
            let Some(sess) = self.sessions.read().await.get(&tenant).cloned() else {
                continue;
            };
            let mut session = sess.lock().await;
            if session.inactive_for(timeout) && self.gateway.is_connected(tenant) {
                info!(%tenant, "inactivity timeout reached, disconnecting");
                self.teardown_locked(tenant, &mut session, DisconnectReason::Inactivity)
                    .await?;
            }
        }
        Ok(())
    }

    /// Warm a session for every tenant with a persisted queue, so restored
    /// state is visible (queue views, counts) before the first command
    /// arrives. Optional; sessions also lazy-load per tenant.
    pub async fn preload(&self) -> Result<usize> {
        let queues = db::queues::load_all(&self.db).await?;
        let count = queues.len();
        for (tenant, items) in queues {
            debug!(%tenant, items = items.len(), "preloading persisted session");
            self.session(tenant).await?;
        }
        if count > 0 {
            info!(tenants = count, "preloaded persisted queues");
        }
        Ok(count)
    }

    /// Fetch or lazily create the tenant's session, loading its persisted
    /// queue and volume on first touch.
    async fn session(&self, tenant: TenantId) -> Result<Arc<Mutex<TenantSession>>> {
        if let Some(existing) = self.sessions.read().await.get(&tenant) {
            return Ok(Arc::clone(existing));
        }

        let volume =
            db::settings::get_volume(&self.db, tenant, self.config.default_volume).await?;
        let stored = db::queues::load_queue(&self.db, tenant).await?;
        if !stored.is_empty() {
            info!(%tenant, items = stored.len(), "restored persisted queue");
        }

        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(tenant).or_insert_with(|| {
            Arc::new(Mutex::new(TenantSession::new(
                stored,
                volume,
                self.config.history_capacity,
            )))
        });
        Ok(Arc::clone(entry))
    }

    async fn persist_queue(&self, tenant: TenantId, session: &TenantSession) -> Result<()> {
        db::queues::save_queue(&self.db, tenant, &session.queue.stored()).await
    }

    // ---- vote gate ------------------------------------------------------

    /// Run the vote gate for one contested action. Returns `Some(reply)`
    /// when voting intercepted the action (tally advanced or duplicate);
    /// `None` means the caller must apply it (bypass or threshold passed).
    fn gate(
        &self,
        session: &mut TenantSession,
        req: &ActionRequest,
        action: ActionKind,
        sub_key: Option<SubKey>,
        bypass: bool,
    ) -> Option<Reply> {
        if bypass {
            debug!(tenant = %req.tenant, principal = %req.principal, %action, "privileged bypass");
            return None;
        }

        let listeners = self.gateway.listener_count(req.tenant);
        match session
            .votes
            .cast(action, sub_key, req.principal, listeners, self.threshold)
        {
            VoteOutcome::AlreadyVoted { .. } => Some(Reply::AlreadyVoted { action }),
            VoteOutcome::Accepted { count, required } => {
                self.events.emit_lossy(PlayerEvent::VoteProgress {
                    tenant: req.tenant,
                    action,
                    count,
                    required,
                    timestamp: Utc::now(),
                });
                Some(Reply::VoteProgress {
                    action,
                    count,
                    required,
                })
            }
            VoteOutcome::Passed { count, required } => {
                info!(tenant = %req.tenant, %action, count, required, "vote passed");
                self.events.emit_lossy(PlayerEvent::VotePassed {
                    tenant: req.tenant,
                    action,
                    count,
                    required,
                    timestamp: Utc::now(),
                });
                None
            }
        }
    }

    /// Capability check shared by every command that acts on a live
    /// session: a connection must exist and the principal must share the
    /// session's voice channel.
    fn require_member(&self, req: &ActionRequest) -> Result<()> {
        if !self.gateway.is_connected(req.tenant) {
            return Err(Error::NotConnected);
        }
        if !self.gateway.shares_channel(req.tenant, req.principal) {
            return Err(Error::NotInVoiceChannel);
        }
        Ok(())
    }

    // ---- commands -------------------------------------------------------

    /// Enqueue a track, or without a query: resume when paused, report the
    /// current track when playing, restart the persisted queue when idle.
    pub async fn play(&self, req: &ActionRequest, query: Option<&str>) -> Result<Reply> {
        if !self.gateway.shares_channel(req.tenant, req.principal) {
            return Err(Error::NotInVoiceChannel);
        }

        let sess = self.session(req.tenant).await?;
        let mut session = sess.lock().await;

        if !self.gateway.is_connected(req.tenant) {
            self.gateway.connect(req.tenant).await?;
        }

        let Some(query) = query else {
            return match session.state {
                SessionState::Paused => {
                    self.resume_locked(req.tenant, &mut session).await?;
                    Ok(Reply::Resumed)
                }
                SessionState::Playing => {
                    let info = session
                        .current
                        .as_ref()
                        .map(TrackInfo::from_active)
                        .ok_or(Error::NothingPlaying)?;
                    Ok(Reply::NowPlaying(info))
                }
                _ => {
                    if session.queue.is_empty() {
                        return Err(Error::QueueEmpty);
                    }
                    self.start_next(req.tenant, &mut session).await?;
                    match session.current.as_ref() {
                        Some(active) => Ok(Reply::NowPlaying(TrackInfo::from_active(active))),
                        None => Err(Error::QueueEmpty),
                    }
                }
            };
        };

        let resolved = self.resolver.resolve(query).await?.ok_or_else(|| {
            Error::Resolution(format!("no playable result for '{query}'"))
        })?;
        let item = resolved.into_item(req.principal);
        let title = item.title.clone();
        let was_active = session.is_active();

        let mut staged = session.queue.clone();
        staged.push_back(item);
        db::queues::save_queue(&self.db, req.tenant, &staged.stored()).await?;
        session.queue = staged;
        debug!(tenant = %req.tenant, %title, len = session.queue.len(), "enqueued");
        self.events.emit_lossy(PlayerEvent::QueueChanged {
            tenant: req.tenant,
            len: session.queue.len(),
            timestamp: Utc::now(),
        });

        if was_active {
            return Ok(Reply::Added { title });
        }

        self.start_next(req.tenant, &mut session).await?;
        match session.current.as_ref() {
            Some(active) => Ok(Reply::NowPlaying(TrackInfo::from_active(active))),
            None => Err(Error::Resolution(format!("could not play '{title}'"))),
        }
    }

    /// Enqueue every resolvable entry of a playlist; unresolvable entries
    /// are skipped, not fatal.
    pub async fn play_many(&self, req: &ActionRequest, queries: &[String]) -> Result<Reply> {
        if !self.gateway.shares_channel(req.tenant, req.principal) {
            return Err(Error::NotInVoiceChannel);
        }
        if !self.gateway.is_connected(req.tenant) {
            self.gateway.connect(req.tenant).await?;
        }

        let mut added = 0usize;
        for query in queries {
            // Resolve outside the session lock so a long playlist does not
            // starve other commands for this tenant.
            let track = match self.resolver.resolve(query).await {
                Ok(Some(track)) => track,
                Ok(None) => {
                    debug!(tenant = %req.tenant, %query, "playlist entry had no result");
                    continue;
                }
                Err(e) => {
                    warn!(tenant = %req.tenant, %query, error = %e, "playlist entry failed to resolve");
                    continue;
                }
            };
            let item = track.into_item(req.principal);

            let sess = self.session(req.tenant).await?;
            let mut session = sess.lock().await;
            let mut staged = session.queue.clone();
            staged.push_back(item);
            db::queues::save_queue(&self.db, req.tenant, &staged.stored()).await?;
            session.queue = staged;
            added += 1;

            if !session.is_active() {
                self.start_next(req.tenant, &mut session).await?;
            }
        }

        if added == 0 {
            return Err(Error::Resolution("no playable items in the playlist".to_string()));
        }

        let len = self.session(req.tenant).await?.lock().await.queue.len();
        self.events.emit_lossy(PlayerEvent::QueueChanged {
            tenant: req.tenant,
            len,
            timestamp: Utc::now(),
        });
        Ok(Reply::AddedMany { count: added })
    }

    /// Skip the active track. Bypassed by admins and by the track's own
    /// requester; everyone else votes.
    pub async fn skip(&self, req: &ActionRequest) -> Result<Reply> {
        self.require_member(req)?;
        let sess = self.session(req.tenant).await?;
        let mut session = sess.lock().await;

        let requester = match session.current.as_ref() {
            Some(active) => active.item.requester,
            None => return Err(Error::NothingPlaying),
        };
        let bypass = req.is_admin || requester == req.principal;
        if let Some(reply) = self.gate(&mut session, req, ActionKind::Skip, None, bypass) {
            return Ok(reply);
        }

        self.advance_locked(req.tenant, &mut session).await?;
        Ok(Reply::Skipped)
    }

    /// Pause the active track. Same bypass rule as skip.
    pub async fn pause(&self, req: &ActionRequest) -> Result<Reply> {
        self.require_member(req)?;
        let sess = self.session(req.tenant).await?;
        let mut session = sess.lock().await;

        if session.state != SessionState::Playing {
            return Err(Error::NothingPlaying);
        }
        let requester = session.current.as_ref().map(|active| active.item.requester);
        let bypass = req.is_admin || requester == Some(req.principal);
        if let Some(reply) = self.gate(&mut session, req, ActionKind::Pause, None, bypass) {
            return Ok(reply);
        }

        self.gateway.pause(req.tenant).await?;
        session.state = SessionState::Paused;
        session.mark_inactive();
        self.events.emit_lossy(PlayerEvent::Paused {
            tenant: req.tenant,
            timestamp: Utc::now(),
        });
        Ok(Reply::Paused)
    }

    /// Resume a paused track. Never vote-gated.
    pub async fn resume(&self, req: &ActionRequest) -> Result<Reply> {
        self.require_member(req)?;
        let sess = self.session(req.tenant).await?;
        let mut session = sess.lock().await;

        if session.state != SessionState::Paused {
            return Err(Error::NotPaused);
        }
        self.resume_locked(req.tenant, &mut session).await?;
        Ok(Reply::Resumed)
    }

    async fn resume_locked(&self, tenant: TenantId, session: &mut TenantSession) -> Result<()> {
        self.gateway.resume(tenant).await?;
        session.state = SessionState::Playing;
        session.clear_inactive();
        // A resume settles any pending pause question.
        session.votes.clear_action(ActionKind::Pause);
        self.events.emit_lossy(PlayerEvent::Resumed {
            tenant,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Stop playback and clear the queue. Admin bypass only; everyone else
    /// votes, and the action applies only when the vote passes.
    pub async fn stop(&self, req: &ActionRequest) -> Result<Reply> {
        self.require_member(req)?;
        let sess = self.session(req.tenant).await?;
        let mut session = sess.lock().await;

        if let Some(reply) = self.gate(&mut session, req, ActionKind::Stop, None, req.is_admin) {
            return Ok(reply);
        }

        self.stop_locked(req.tenant, &mut session).await?;
        Ok(Reply::Stopped)
    }

    async fn stop_locked(&self, tenant: TenantId, session: &mut TenantSession) -> Result<()> {
        // Taking `current` first makes any in-flight completion stale. The
        // interrupted track still counts as finished for history purposes;
        // loop re-insertion is moot since the queue and loop mode are
        // cleared below.
        if let Some(active) = session.current.take() {
            session.history.push(active.item);
        }

        let mut staged = session.queue.clone();
        staged.clear();
        db::queues::save_queue(&self.db, tenant, &staged.stored()).await?;
        session.queue = staged;

        session.loop_mode = LoopMode::Off;
        session.votes.clear();
        self.gateway.halt(tenant).await?;
        session.state = SessionState::Idle;
        session.mark_inactive();

        info!(%tenant, "playback stopped, queue cleared");
        self.events.emit_lossy(PlayerEvent::Stopped {
            tenant,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Shuffle the upcoming queue. Admin bypass only.
    pub async fn shuffle(&self, req: &ActionRequest) -> Result<Reply> {
        self.require_member(req)?;
        let sess = self.session(req.tenant).await?;
        let mut session = sess.lock().await;

        if session.queue.len() < 2 {
            return Err(Error::TooShortToShuffle);
        }
        if let Some(reply) = self.gate(&mut session, req, ActionKind::Shuffle, None, req.is_admin) {
            return Ok(reply);
        }

        let mut staged = session.queue.clone();
        staged.shuffle()?;
        db::queues::save_queue(&self.db, req.tenant, &staged.stored()).await?;
        session.queue = staged;
        // The permutation moved every position; pending remove tallies now
        // point at different items.
        session.votes.clear_action(ActionKind::Remove);

        self.events.emit_lossy(PlayerEvent::QueueChanged {
            tenant: req.tenant,
            len: session.queue.len(),
            timestamp: Utc::now(),
        });
        Ok(Reply::Shuffled)
    }

    /// Remove the item at a 1-based queue position. Bypassed by admins and
    /// by the item's own requester; votes are keyed per position.
    pub async fn remove(&self, req: &ActionRequest, position: usize) -> Result<Reply> {
        self.require_member(req)?;
        let sess = self.session(req.tenant).await?;
        let mut session = sess.lock().await;

        let target_requester = match session.queue.get(position) {
            Some(item) => item.requester,
            None => {
                return Err(Error::IndexOutOfRange {
                    index: position,
                    len: session.queue.len(),
                })
            }
        };
        let bypass = req.is_admin || target_requester == req.principal;
        if let Some(reply) = self.gate(
            &mut session,
            req,
            ActionKind::Remove,
            Some(SubKey::Position(position)),
            bypass,
        ) {
            return Ok(reply);
        }

        let mut staged = session.queue.clone();
        let removed = staged.remove_at(position)?;
        db::queues::save_queue(&self.db, req.tenant, &staged.stored()).await?;
        session.queue = staged;
        // Positions shifted; any other pending remove tally now points at
        // the wrong item.
        session.votes.clear_action(ActionKind::Remove);

        self.events.emit_lossy(PlayerEvent::QueueChanged {
            tenant: req.tenant,
            len: session.queue.len(),
            timestamp: Utc::now(),
        });
        Ok(Reply::Removed {
            title: removed.title,
        })
    }

    /// Clear the upcoming queue, leaving the active track playing. Admin
    /// bypass only.
    pub async fn clear(&self, req: &ActionRequest) -> Result<Reply> {
        self.require_member(req)?;
        let sess = self.session(req.tenant).await?;
        let mut session = sess.lock().await;

        if session.queue.is_empty() {
            return Err(Error::QueueEmpty);
        }
        if let Some(reply) = self.gate(&mut session, req, ActionKind::Clear, None, req.is_admin) {
            return Ok(reply);
        }

        let mut staged = session.queue.clone();
        staged.clear();
        db::queues::save_queue(&self.db, req.tenant, &staged.stored()).await?;
        session.queue = staged;
        session.votes.clear_action(ActionKind::Remove);

        self.events.emit_lossy(PlayerEvent::QueueChanged {
            tenant: req.tenant,
            len: 0,
            timestamp: Utc::now(),
        });
        Ok(Reply::Cleared)
    }

    /// Set the loop mode. Admin bypass only; votes are keyed per proposed
    /// mode, so competing proposals tally independently.
    pub async fn set_loop(&self, req: &ActionRequest, mode: &str) -> Result<Reply> {
        let mode: LoopMode = mode.parse().map_err(Error::InvalidLoopMode)?;
        let sess = self.session(req.tenant).await?;
        let mut session = sess.lock().await;

        if let Some(reply) = self.gate(
            &mut session,
            req,
            ActionKind::Loop,
            Some(SubKey::Mode(mode)),
            req.is_admin,
        ) {
            return Ok(reply);
        }

        session.loop_mode = mode;
        // A settled mode supersedes the competing proposals.
        session.votes.clear_action(ActionKind::Loop);

        info!(tenant = %req.tenant, %mode, "loop mode changed");
        self.events.emit_lossy(PlayerEvent::LoopModeChanged {
            tenant: req.tenant,
            mode,
            timestamp: Utc::now(),
        });
        Ok(Reply::LoopSet { mode })
    }

    /// Current loop mode.
    pub async fn loop_mode(&self, tenant: TenantId) -> Result<LoopMode> {
        let sess = self.session(tenant).await?;
        let session = sess.lock().await;
        Ok(session.loop_mode)
    }

    /// Tear down the session and leave the voice channel. Admin bypass
    /// only. History survives the teardown.
    pub async fn disconnect(&self, req: &ActionRequest) -> Result<Reply> {
        self.require_member(req)?;
        let sess = self.session(req.tenant).await?;
        let mut session = sess.lock().await;

        if let Some(reply) = self.gate(
            &mut session,
            req,
            ActionKind::Disconnect,
            None,
            req.is_admin,
        ) {
            return Ok(reply);
        }

        self.teardown_locked(req.tenant, &mut session, DisconnectReason::Requested)
            .await?;
        Ok(Reply::Disconnected)
    }

    /// Rewind one step: re-prepend the previous and the just-finished
    /// (or currently playing) tracks, then force a restart from the front.
    /// Never vote-gated; requires at least two history entries.
    pub async fn previous(&self, req: &ActionRequest) -> Result<Reply> {
        self.require_member(req)?;
        let sess = self.session(req.tenant).await?;
        let mut session = sess.lock().await;

        let has_current = session.current.is_some();
        if session.history.len() + usize::from(has_current) < 2 {
            return Err(Error::NoPrevious);
        }

        // An interrupted current track goes into history first so the
        // rewind pair is (previous, current).
        if let Some(active) = session.current.take() {
            session.history.push(active.item);
        }
        let Some((prev, last)) = session.history.pop_last_two() else {
            return Err(Error::NoPrevious);
        };

        let mut staged = session.queue.clone();
        staged.insert_front(last);
        staged.insert_front(prev);
        db::queues::save_queue(&self.db, req.tenant, &staged.stored()).await?;
        session.queue = staged;

        if has_current {
            self.gateway.halt(req.tenant).await?;
        }
        self.start_next(req.tenant, &mut session).await?;
        Ok(Reply::Previous)
    }

    /// Report the tenant's volume, or set it (0..=200 percent, persisted).
    pub async fn volume(&self, req: &ActionRequest, volume: Option<u16>) -> Result<Reply> {
        if !self.gateway.is_connected(req.tenant) {
            return Err(Error::NotConnected);
        }
        let sess = self.session(req.tenant).await?;
        let mut session = sess.lock().await;

        let Some(volume) = volume else {
            return Ok(Reply::Volume {
                volume: session.volume,
                changed: false,
            });
        };
        if volume > MAX_VOLUME {
            return Err(Error::VolumeOutOfRange(volume));
        }

        db::settings::set_volume(&self.db, req.tenant, volume).await?;
        session.volume = volume;
        self.gateway.set_volume(req.tenant, volume).await?;

        self.events.emit_lossy(PlayerEvent::VolumeChanged {
            tenant: req.tenant,
            volume,
            timestamp: Utc::now(),
        });
        Ok(Reply::Volume {
            volume,
            changed: true,
        })
    }

    /// Snapshot of the active track and upcoming queue.
    pub async fn queue_view(&self, tenant: TenantId) -> Result<Reply> {
        let sess = self.session(tenant).await?;
        let session = sess.lock().await;

        let now_playing = session.current.as_ref().map(TrackInfo::from_active);
        if now_playing.is_none() && session.queue.is_empty() {
            return Err(Error::QueueEmpty);
        }
        Ok(Reply::Queue(QueueView {
            now_playing,
            upcoming: session.queue.stored(),
            loop_mode: session.loop_mode,
        }))
    }

    /// Current state machine position.
    pub async fn state(&self, tenant: TenantId) -> Result<SessionState> {
        let sess = self.session(tenant).await?;
        let session = sess.lock().await;
        Ok(session.state)
    }

    // ---- transitions ----------------------------------------------------

    /// Natural completion signal from the gateway, already serialized by
    /// the pump. Drops stale sequence numbers.
    async fn handle_track_end(&self, tenant: TenantId, seq: u64) -> Result<()> {
        let sess = self.session(tenant).await?;
        let mut session = sess.lock().await;

        if session.is_stale(seq) {
            debug!(%tenant, seq, "dropping stale completion signal");
            return Ok(());
        }
        let finished = session.current.take().map(|active| active.item);

        if !self.gateway.is_connected(tenant) {
            // Connection died under the track; don't try to start another.
            session.state = SessionState::Idle;
            session.mark_inactive();
            return Ok(());
        }
        self.on_track_end(tenant, &mut session, finished).await
    }

    /// Explicit advance (skip): make any in-flight completion stale, kill
    /// the live source without a completion signal, then run the shared
    /// end-of-track transition.
    async fn advance_locked(&self, tenant: TenantId, session: &mut TenantSession) -> Result<()> {
        let finished = session.current.take().map(|active| active.item);
        self.gateway.halt(tenant).await?;
        self.on_track_end(tenant, session, finished).await
    }

    /// Shared end-of-track transition: record history, apply loop
    /// re-insertion, start whatever is next.
    async fn on_track_end(
        &self,
        tenant: TenantId,
        session: &mut TenantSession,
        finished: Option<PlayableItem>,
    ) -> Result<()> {
        if let Some(item) = finished {
            session.history.push(item.clone());
            match session.loop_mode {
                LoopMode::Song => session.queue.insert_front(item),
                LoopMode::Queue => session.queue.push_back(item),
                LoopMode::Off => {}
            }
        }
        self.start_next(tenant, session).await
    }

    /// Pop and start the next playable item, discarding unplayable ones,
    /// until something starts or the queue drains.
    async fn start_next(&self, tenant: TenantId, session: &mut TenantSession) -> Result<()> {
        session.state = SessionState::Transitioning;
        session.current = None;
        session.votes.reset_track_votes();
        // Popping the front shifts every remaining position.
        session.votes.clear_action(ActionKind::Remove);

        loop {
            let Some(mut item) = session.queue.pop_front() else {
                self.persist_queue(tenant, session).await?;
                session.state = SessionState::Idle;
                session.mark_inactive();
                info!(%tenant, "queue finished");
                self.events.emit_lossy(PlayerEvent::QueueFinished {
                    tenant,
                    timestamp: Utc::now(),
                });
                return Ok(());
            };

            let locator = match item.locator.clone() {
                Some(locator) => locator,
                // Items restored from persistence carry no stream locator;
                // re-resolve just before playback.
                None => match self.reresolve(&item).await {
                    Some(locator) => {
                        item.locator = Some(locator.clone());
                        locator
                    }
                    None => {
                        warn!(%tenant, title = %item.title, "discarding unplayable item");
                        self.events.emit_lossy(PlayerEvent::TrackUnplayable {
                            tenant,
                            title: item.title.clone(),
                            timestamp: Utc::now(),
                        });
                        continue;
                    }
                },
            };

            let seq = session.next_seq();
            let on_end = self.signals().track_end_handle(tenant, seq);
            if let Err(e) = self.gateway.begin(tenant, &locator, session.volume, on_end).await {
                warn!(%tenant, title = %item.title, error = %e, "source failed to start, discarding");
                self.events.emit_lossy(PlayerEvent::TrackUnplayable {
                    tenant,
                    title: item.title.clone(),
                    timestamp: Utc::now(),
                });
                continue;
            }

            self.persist_queue(tenant, session).await?;

            info!(%tenant, title = %item.title, seq, "now playing");
            self.events.emit_lossy(PlayerEvent::NowPlaying {
                tenant,
                title: item.title.clone(),
                stable_id: item.stable_id.clone(),
                uploader: item.uploader.clone(),
                duration: item.duration,
                requester: item.requester,
                timestamp: Utc::now(),
            });

            session.current = Some(ActiveTrack {
                item,
                seq,
                started_at: std::time::Instant::now(),
            });
            session.state = SessionState::Playing;
            session.clear_inactive();
            return Ok(());
        }
    }

    async fn reresolve(&self, item: &PlayableItem) -> Option<StreamLocator> {
        let stable_id = item.stable_id.as_deref()?;
        match self.resolver.resolve_by_id(stable_id).await {
            Ok(Some(track)) => Some(track.locator),
            Ok(None) => None,
            Err(e) => {
                warn!(stable_id, error = %e, "re-resolution failed");
                None
            }
        }
    }

    /// Full session teardown: clear queue and votes, reset loop mode, leave
    /// the channel. History is intentionally preserved.
    async fn teardown(&self, tenant: TenantId, reason: DisconnectReason) -> Result<()> {
        let sess = self.session(tenant).await?;
        let mut session = sess.lock().await;
        self.teardown_locked(tenant, &mut session, reason).await
    }

    async fn teardown_locked(
        &self,
        tenant: TenantId,
        session: &mut TenantSession,
        reason: DisconnectReason,
    ) -> Result<()> {
        info!(%tenant, ?reason, "tearing down session");
        session.current = None;

        let mut staged = session.queue.clone();
        staged.clear();
        db::queues::save_queue(&self.db, tenant, &staged.stored()).await?;
        session.queue = staged;

        session.loop_mode = LoopMode::Off;
        session.votes.clear();
        session.state = SessionState::Idle;
        session.clear_inactive();

        if self.gateway.is_connected(tenant) {
            self.gateway.disconnect(tenant).await?;
        }

        self.events.emit_lossy(PlayerEvent::Disconnected {
            tenant,
            reason,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
