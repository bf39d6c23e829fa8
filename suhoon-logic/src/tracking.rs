use std::sync::{Arc, Weak};

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::RwLock,
    task::JoinHandle,
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use crate::{
    UtcDT,
    geo::{DistanceEstimate, haversine_meters},
    location::{GeoCoordinate, LocationService, POSITION_OPTIONS},
    map::{MapAdapter, MapView, Marker, MarkerKind, TileSource},
    prelude::*,
    settings::TrackerSettings,
    simulator::LocationSimulator,
};

pub trait StateUpdateSender: Send + Sync {
    fn send_update(&self);
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    /// Nothing requested yet, or the user reset the session
    Idle,
    /// Waiting on the device for a position
    Locating,
    /// Technician is on their way, ticking toward the user
    Active,
    /// Couldn't get a position, the user has to try again
    Error,
}

/// Serializable view of a [TrackingSession] for the UI.
///
/// `technician`, `distance_meters`, and `eta_minutes` are only present while
/// the session is [TrackingStatus::Active].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackingSnapshot {
    pub status: TrackingStatus,
    pub user: Option<GeoCoordinate>,
    pub technician: Option<GeoCoordinate>,
    pub distance_meters: Option<f64>,
    pub eta_minutes: Option<u32>,
    /// Technician is within the arrival threshold, ticks no longer move it
    pub arrived: bool,
    /// Movement ticks since tracking started
    pub ticks: u32,
    pub markers: Vec<Marker>,
    pub updated_at: UtcDT,
}

/// Owned handle on the repeating movement timer. Dropping it stops the timer.
struct TickerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TickerHandle {
    fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct SessionState<V: MapView> {
    status: TrackingStatus,
    simulator: LocationSimulator,
    estimate: DistanceEstimate,
    /// Only allocated while active
    map: Option<V>,
    /// Only allocated while active
    ticker: Option<TickerHandle>,
    /// Bumped on every reset so stale position lookups are discarded
    generation: u64,
    updated_at: UtcDT,
}

impl<V: MapView> SessionState<V> {
    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Drop the map and timer and forget both coordinates
    fn release(&mut self) {
        self.ticker = None;
        self.map = None;
        self.simulator.reset();
        self.estimate = DistanceEstimate::default();
    }

    /// Push the technician's position to the map and re-measure
    fn sync_map(&mut self) {
        let (Some(user), Some(tech)) = (self.simulator.user(), self.simulator.technician()) else {
            return;
        };

        let distance = if let Some(map) = self.map.as_mut() {
            map.place_marker(MarkerKind::Technician, tech);
            map.distance(&user, &tech)
        } else {
            haversine_meters(&user, &tech)
        };

        self.estimate = self.simulator.estimate_from_meters(distance);
    }

    fn snapshot(&self) -> TrackingSnapshot {
        let active = self.status == TrackingStatus::Active;
        TrackingSnapshot {
            status: self.status,
            user: self.simulator.user().filter(|_| active),
            technician: self.simulator.technician().filter(|_| active),
            distance_meters: active.then_some(self.estimate.distance_meters),
            eta_minutes: active.then_some(self.estimate.eta_minutes),
            arrived: active && self.simulator.has_arrived(),
            ticks: if active { self.simulator.ticks() } else { 0 },
            markers: self.map.as_ref().map(|m| m.markers()).unwrap_or_default(),
            updated_at: self.updated_at,
        }
    }
}

/// One location lookup interaction, from the user's request until they reset.
///
/// Gets the user's position with [LocationService], synthesizes a technician
/// near them with [LocationSimulator], and draws both on a map from
/// [MapAdapter]. The map and the movement timer only exist while the session
/// is [TrackingStatus::Active].
pub struct TrackingSession<L: LocationService, M: MapAdapter, S: StateUpdateSender> {
    state: RwLock<SessionState<M::View>>,
    location: L,
    maps: M,
    tiles: TileSource,
    state_update_sender: S,
    settings: TrackerSettings,
}

impl<L, M, S> TrackingSession<L, M, S>
where
    L: LocationService + 'static,
    M: MapAdapter + 'static,
    S: StateUpdateSender + 'static,
{
    pub fn new(
        settings: TrackerSettings,
        location: L,
        maps: M,
        tiles: TileSource,
        state_update_sender: S,
    ) -> Result<Self> {
        settings.validate()?;

        let state = SessionState {
            status: TrackingStatus::Idle,
            simulator: LocationSimulator::from_settings(settings.clone()),
            estimate: DistanceEstimate::default(),
            map: None,
            ticker: None,
            generation: 0,
            updated_at: Utc::now(),
        };

        Ok(Self {
            state: RwLock::new(state),
            location,
            maps,
            tiles,
            state_update_sender,
            settings,
        })
    }

    pub async fn status(&self) -> TrackingStatus {
        self.state.read().await.status
    }

    pub async fn snapshot(&self) -> TrackingSnapshot {
        self.state.read().await.snapshot()
    }

    /// Whether a map view is currently allocated
    pub async fn has_map(&self) -> bool {
        self.state.read().await.map.is_some()
    }

    /// Whether the movement timer is currently running
    pub async fn is_ticking(&self) -> bool {
        self.state
            .read()
            .await
            .ticker
            .as_ref()
            .is_some_and(TickerHandle::is_running)
    }

    /// Ask for the user's position and start tracking.
    ///
    /// Does nothing if the session is already locating or active. On failure
    /// the session ends up in [TrackingStatus::Error], there is no automatic
    /// retry.
    pub async fn locate(self: &Arc<Self>) -> TrackingStatus {
        let generation = {
            let mut state = self.state.write().await;
            if matches!(
                state.status,
                TrackingStatus::Locating | TrackingStatus::Active
            ) {
                return state.status;
            }
            state.status = TrackingStatus::Locating;
            state.touch();
            state.generation
        };
        self.state_update_sender.send_update();

        let lookup = tokio::time::timeout(
            POSITION_OPTIONS.timeout_duration(),
            self.location.current_position(POSITION_OPTIONS),
        )
        .await;

        let mut state = self.state.write().await;

        if state.generation != generation || state.status != TrackingStatus::Locating {
            debug!("Discarding position lookup, session was reset while locating");
            return state.status;
        }

        match lookup {
            Ok(Ok(user)) => self.activate(&mut state, user),
            Ok(Err(why)) => {
                warn!("Failed to get position: {why:?}");
                state.status = TrackingStatus::Error;
            }
            Err(_) => {
                warn!(
                    "Timed out after {}ms waiting for position",
                    POSITION_OPTIONS.timeout
                );
                state.status = TrackingStatus::Error;
            }
        }

        state.touch();
        let status = state.status;
        drop(state);
        self.state_update_sender.send_update();
        status
    }

    fn activate(
        self: &Arc<Self>,
        state: &mut SessionState<M::View>,
        user: GeoCoordinate,
    ) {
        let technician = state.simulator.begin(user);

        state.map = match self.maps.open(&self.tiles) {
            Ok(mut map) => {
                map.place_marker(MarkerKind::User, user);
                map.place_marker(MarkerKind::Technician, technician);
                map.fit_bounds(&[user, technician]);
                Some(map)
            }
            Err(why) => {
                warn!("Failed to open map, tracking without one: {why:?}");
                None
            }
        };

        state.sync_map();
        state.ticker = Some(self.spawn_ticker());
        state.status = TrackingStatus::Active;

        info!(
            "Tracking started, technician is {:.0}m away (~{} min)",
            state.estimate.distance_meters, state.estimate.eta_minutes
        );
    }

    fn spawn_ticker(self: &Arc<Self>) -> TickerHandle {
        let cancel = CancellationToken::new();
        let session: Weak<Self> = Arc::downgrade(self);
        let period = self.settings.tick_interval();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    biased;

                    _ = token.cancelled() => break,

                    _ = interval.tick() => {
                        let Some(session) = session.upgrade() else {
                            break;
                        };
                        session.tick().await;
                    }
                }
            }
            debug!("Movement timer stopped");
        });

        TickerHandle { cancel, task }
    }

    /// Move the technician one step toward the user.
    /// Returns whether the technician moved.
    pub async fn tick(&self) -> bool {
        let mut state = self.state.write().await;

        if state.status != TrackingStatus::Active || !state.simulator.tick() {
            return false;
        }

        state.sync_map();
        state.touch();
        drop(state);

        self.state_update_sender.send_update();
        true
    }

    /// Go back to [TrackingStatus::Idle], stopping the timer and tearing down the map
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        state.release();
        state.status = TrackingStatus::Idle;
        state.generation += 1;
        state.touch();
        drop(state);
        self.state_update_sender.send_update();
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::atomic::Ordering, time::Duration};

    use tokio::{task::yield_now, test};

    use super::*;
    use crate::tests::{CountingSender, FailingLocation, MockLocation, MockMap, SlowLocation};

    const SEOUL: GeoCoordinate = GeoCoordinate::new(37.5, 127.0);

    type TestSession = TrackingSession<MockLocation, MockMap, CountingSender>;

    fn mk_session() -> (Arc<TestSession>, MockMap, CountingSender) {
        tokio::time::pause();
        let maps = MockMap::default();
        let sender = CountingSender::default();
        let session = TrackingSession::new(
            TrackerSettings::default().with_seed(11),
            MockLocation(SEOUL),
            maps.clone(),
            TileSource::default(),
            sender.clone(),
        )
        .unwrap();
        (Arc::new(session), maps, sender)
    }

    async fn settle() {
        for _ in 0..5 {
            yield_now().await;
        }
    }

    #[test]
    async fn test_starts_idle() {
        let (session, maps, _) = mk_session();
        let snap = session.snapshot().await;
        assert_eq!(snap.status, TrackingStatus::Idle);
        assert!(snap.user.is_none() && snap.technician.is_none());
        assert!(snap.distance_meters.is_none() && snap.eta_minutes.is_none());
        assert_eq!(maps.live_views(), 0);
    }

    #[test]
    async fn test_locate_activates() {
        let (session, maps, sender) = mk_session();

        assert_eq!(session.locate().await, TrackingStatus::Active);

        let snap = session.snapshot().await;
        assert_eq!(snap.user, Some(SEOUL));
        let tech = snap.technician.expect("No technician");
        assert_ne!(tech, SEOUL);
        let distance = snap.distance_meters.expect("No distance");
        assert!((1_100.0..=2_200.0).contains(&distance), "Got {distance}m");
        assert_eq!(
            snap.eta_minutes,
            Some((distance / 400.0).ceil() as u32),
            "ETA doesn't match distance"
        );
        assert_eq!(snap.markers.len(), 2);
        assert_eq!(maps.live_views(), 1);
        assert!(session.is_ticking().await);
        // Locating + Active
        assert_eq!(sender.count(), 2);
    }

    #[test]
    async fn test_locate_twice_is_noop() {
        let (session, maps, _) = mk_session();
        session.locate().await;
        let first = session.snapshot().await.technician;
        assert_eq!(session.locate().await, TrackingStatus::Active);
        assert_eq!(session.snapshot().await.technician, first);
        assert_eq!(maps.opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    async fn test_location_failure() {
        tokio::time::pause();
        let maps = MockMap::default();
        let session = Arc::new(TrackingSession::new(
            TrackerSettings::default(),
            FailingLocation,
            maps.clone(),
            TileSource::default(),
            CountingSender::default(),
        )
        .unwrap());

        assert_eq!(session.locate().await, TrackingStatus::Error);
        let snap = session.snapshot().await;
        assert!(snap.user.is_none() && snap.technician.is_none());
        assert_eq!(maps.opened.load(Ordering::SeqCst), 0);
        assert!(!session.is_ticking().await);

        // No automatic retry, stays in error
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(session.status().await, TrackingStatus::Error);
    }

    #[test]
    async fn test_location_timeout() {
        tokio::time::pause();
        let session = Arc::new(TrackingSession::new(
            TrackerSettings::default(),
            SlowLocation(Duration::from_secs(60)),
            MockMap::default(),
            TileSource::default(),
            CountingSender::default(),
        )
        .unwrap());

        assert_eq!(session.locate().await, TrackingStatus::Error);
    }

    #[test]
    async fn test_timer_moves_technician() {
        let (session, _, _) = mk_session();
        session.locate().await;
        let start = session.snapshot().await.distance_meters.unwrap();

        tokio::time::sleep(Duration::from_millis(3500)).await;
        settle().await;

        let now = session.snapshot().await.distance_meters.unwrap();
        assert!(now < start, "Technician did not move ({now} >= {start})");
    }

    #[test]
    async fn test_sixty_seconds_under_five_percent() {
        let (session, _, _) = mk_session();
        session.locate().await;
        let start = session.snapshot().await.distance_meters.unwrap();

        tokio::time::sleep(Duration::from_millis(60_500)).await;
        settle().await;

        let now = session.snapshot().await.distance_meters.unwrap();
        assert!(now < start * 0.05, "{now}m left of {start}m");
    }

    #[test]
    async fn test_manual_tick_reports_arrival() {
        let (session, _, _) = mk_session();
        session.locate().await;
        // Stop the timer from interfering
        session.state.write().await.ticker = None;

        let mut ticks = 0;
        while session.tick().await {
            ticks += 1;
            assert!(ticks < 1_000, "Technician never arrived");
        }
        let snap = session.snapshot().await;
        assert!(snap.arrived);
        assert_eq!(snap.status, TrackingStatus::Active);
        assert_eq!(snap.ticks, ticks);
        assert!(!session.tick().await);
        assert_eq!(session.snapshot().await.ticks, ticks);
    }

    #[test]
    async fn test_reset_releases_resources() {
        let (session, maps, _) = mk_session();
        session.locate().await;
        assert_eq!(maps.live_views(), 1);

        session.reset().await;
        settle().await;

        let snap = session.snapshot().await;
        assert_eq!(snap.status, TrackingStatus::Idle);
        assert!(snap.user.is_none() && snap.technician.is_none());
        assert!(snap.markers.is_empty());
        assert_eq!(snap.ticks, 0);
        assert_eq!(maps.live_views(), 0, "Map view was not torn down");
        assert!(!session.has_map().await);
        assert!(!session.is_ticking().await);

        // Ticks after reset do nothing
        assert!(!session.tick().await);
    }

    #[test]
    async fn test_relocate_allocates_fresh_map() {
        let (session, maps, _) = mk_session();
        session.locate().await;
        session.reset().await;
        assert_eq!(session.locate().await, TrackingStatus::Active);
        assert_eq!(maps.opened.load(Ordering::SeqCst), 2);
        assert_eq!(maps.live_views(), 1);
    }

    #[test]
    async fn test_reset_while_locating() {
        tokio::time::pause();
        let session = Arc::new(TrackingSession::new(
            TrackerSettings::default(),
            SlowLocation(Duration::from_secs(2)),
            MockMap::default(),
            TileSource::default(),
            CountingSender::default(),
        )
        .unwrap());

        let locating = tokio::spawn({
            let session = session.clone();
            async move { session.locate().await }
        });
        settle().await;
        assert_eq!(session.status().await, TrackingStatus::Locating);

        session.reset().await;
        let status = locating.await.expect("Locate task panicked");
        assert_eq!(status, TrackingStatus::Idle);
        assert!(!session.has_map().await);
    }

    #[test]
    async fn test_dropping_session_stops_timer() {
        let (session, maps, _) = mk_session();
        session.locate().await;
        drop(session);
        settle().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(maps.live_views(), 0);
    }

    #[test]
    async fn test_map_failure_still_tracks() {
        tokio::time::pause();
        let maps = MockMap::failing();
        let session = Arc::new(TrackingSession::new(
            TrackerSettings::default(),
            MockLocation(SEOUL),
            maps,
            TileSource::default(),
            CountingSender::default(),
        )
        .unwrap());

        assert_eq!(session.locate().await, TrackingStatus::Active);
        let snap = session.snapshot().await;
        assert!(snap.markers.is_empty());
        assert!(snap.distance_meters.is_some());
    }

    #[test]
    async fn test_invalid_settings_refused() {
        let bad = [
            TrackerSettings {
                tick_millis: 0,
                ..Default::default()
            },
            TrackerSettings {
                min_offset_deg: 0.02,
                max_offset_deg: 0.01,
                ..Default::default()
            },
        ];
        for settings in bad {
            let session = TrackingSession::new(
                settings.clone(),
                MockLocation(SEOUL),
                MockMap::default(),
                TileSource::default(),
                CountingSender::default(),
            );
            assert!(session.is_err(), "Accepted {settings:?}");
        }
    }
}
