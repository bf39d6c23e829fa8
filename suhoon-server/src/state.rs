use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use log::{debug, info};
use suhoon_logic::{
    DiagnosisClient, GeoCoordinate, HeadlessMap, LocationService, PhoneSuffix, PositionOptions,
    ReportedLocation, SiteProfile, StateUpdateSender, TileSource, TrackerSettings,
    TrackingSession, TrackingSnapshot, prelude::*,
};
use tokio::{task::JoinHandle, time::Instant};
use uuid::Uuid;

pub type SessionId = Uuid;
pub type Session = TrackingSession<BrowserLocation, HeadlessMap, LogSender>;

type Trackers = Arc<Mutex<HashMap<SessionId, Tracker>>>;

/// Sessions kept at once before new ones are refused
const MAX_SESSIONS: usize = 1024;

/// Sessions nobody has looked at for this long are dropped
pub const SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// How often the reaper sweeps for stale sessions
const REAP_PERIOD: Duration = Duration::from_secs(60);

/// Position the browser reported for the next lookup
#[derive(Debug, Clone, Default)]
pub struct BrowserLocation(Arc<Mutex<Option<GeoCoordinate>>>);

impl BrowserLocation {
    pub fn report(&self, position: Option<GeoCoordinate>) {
        *self.0.lock().unwrap() = position;
    }
}

impl LocationService for BrowserLocation {
    async fn current_position(&self, options: PositionOptions) -> Result<GeoCoordinate> {
        let reported = ReportedLocation(*self.0.lock().unwrap());
        reported.current_position(options).await
    }
}

/// Sessions are polled, so updates are only logged
pub struct LogSender(SessionId);

impl StateUpdateSender for LogSender {
    fn send_update(&self) {
        debug!("Session {} updated", self.0);
    }
}

#[derive(Clone)]
pub struct Tracker {
    pub session: Arc<Session>,
    /// Key the customer looked their visit up with
    pub phone_suffix: PhoneSuffix,
    position: BrowserLocation,
    last_seen: Arc<Mutex<Instant>>,
}

impl Tracker {
    fn touch(&self) {
        *self.last_seen.lock().unwrap() = Instant::now();
    }

    fn is_stale(&self, now: Instant) -> bool {
        now.saturating_duration_since(*self.last_seen.lock().unwrap()) >= SESSION_TTL
    }

    /// Look up the position reported by the browser and start tracking from it
    pub async fn locate(&self, position: Option<GeoCoordinate>) -> TrackingSnapshot {
        self.position.report(position);
        self.session.locate().await;
        self.session.snapshot().await
    }
}

#[derive(Debug)]
pub enum CreateTrackerError {
    /// Session limit reached even after dropping stale sessions
    TooManySessions,
    /// The session refused the tracker settings
    Session(anyhow::Error),
}

/// Drop every session that hasn't been touched within [SESSION_TTL].
/// Dropping the last handle on an active session stops its timer.
fn evict_stale(trackers: &Mutex<HashMap<SessionId, Tracker>>) -> usize {
    let now = Instant::now();
    let mut trackers = trackers.lock().unwrap();
    let before = trackers.len();
    trackers.retain(|id, tracker| {
        let stale = tracker.is_stale(now);
        if stale {
            info!("Evicting idle tracking session {id}");
        }
        !stale
    });
    before - trackers.len()
}

pub struct ServerState<C: DiagnosisClient> {
    diagnosis: Option<Arc<C>>,
    trackers: Trackers,
    settings: TrackerSettings,
    site: Arc<SiteProfile>,
}

impl<C: DiagnosisClient> Clone for ServerState<C> {
    fn clone(&self) -> Self {
        Self {
            diagnosis: self.diagnosis.clone(),
            trackers: self.trackers.clone(),
            settings: self.settings.clone(),
            site: self.site.clone(),
        }
    }
}

impl<C: DiagnosisClient> ServerState<C> {
    /// `diagnosis` is `None` when no client could be configured, diagnosis
    /// requests then fail with the generic message
    pub fn new(diagnosis: Option<C>, settings: TrackerSettings) -> Result<Self> {
        settings.validate().context("Invalid tracker settings")?;
        Ok(Self {
            diagnosis: diagnosis.map(Arc::new),
            trackers: Arc::default(),
            settings,
            site: Arc::new(SiteProfile::default()),
        })
    }

    pub fn site(&self) -> &SiteProfile {
        &self.site
    }

    pub fn diagnosis(&self) -> Option<Arc<C>> {
        self.diagnosis.clone()
    }

    /// Create a new idle tracking session for the visit booked with `phone_suffix`
    pub fn create_tracker(
        &self,
        phone_suffix: PhoneSuffix,
    ) -> Result<(SessionId, Tracker), CreateTrackerError> {
        self.evict_stale();

        let mut trackers = self.trackers.lock().unwrap();
        if trackers.len() >= MAX_SESSIONS {
            return Err(CreateTrackerError::TooManySessions);
        }

        let id = Uuid::new_v4();
        // Every session gets its own technician
        let settings = self
            .settings
            .clone()
            .with_seed(self.settings.random_seed ^ id.as_u128() as u64);
        let position = BrowserLocation::default();
        let session = TrackingSession::new(
            settings,
            position.clone(),
            HeadlessMap,
            TileSource::default(),
            LogSender(id),
        )
        .map_err(CreateTrackerError::Session)?;

        let tracker = Tracker {
            session: Arc::new(session),
            phone_suffix,
            position,
            last_seen: Arc::new(Mutex::new(Instant::now())),
        };
        trackers.insert(id, tracker.clone());
        info!("Created tracking session {id}");
        Ok((id, tracker))
    }

    /// Look up a session, counts as activity for eviction
    pub fn tracker(&self, id: &SessionId) -> Option<Tracker> {
        let tracker = self.trackers.lock().unwrap().get(id).cloned();
        if let Some(tracker) = &tracker {
            tracker.touch();
        }
        tracker
    }

    /// Drop sessions idle for longer than [SESSION_TTL], returns how many were dropped
    pub fn evict_stale(&self) -> usize {
        evict_stale(&self.trackers)
    }

    /// Periodically evict stale sessions so abandoned ones stop ticking
    /// even when nobody creates new ones
    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        let trackers = self.trackers.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(REAP_PERIOD);
            loop {
                interval.tick().await;
                let evicted = evict_stale(&trackers);
                if evicted > 0 {
                    debug!("Reaped {evicted} stale tracking sessions");
                }
            }
        })
    }

    /// Forget a session, returns it so the caller can tear it down
    pub fn remove_tracker(&self, id: &SessionId) -> Option<Tracker> {
        let removed = self.trackers.lock().unwrap().remove(id);
        if removed.is_some() {
            info!("Removed tracking session {id}");
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.trackers.lock().unwrap().len()
    }
}
