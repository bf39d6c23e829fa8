use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::anyhow;
use tokio::sync::Notify;

use crate::{
    DiagnosisClient, DiagnosisError, DiagnosisRequest, DiagnosisResult, GeoCoordinate,
    HeadlessMapView, LocationService, MapAdapter, MapView, Marker, MarkerKind, PositionOptions,
    StateUpdateSender, TileSource, prelude::*,
};

pub struct MockLocation(pub GeoCoordinate);

impl LocationService for MockLocation {
    async fn current_position(&self, _options: PositionOptions) -> Result<GeoCoordinate> {
        Ok(self.0)
    }
}

pub struct FailingLocation;

impl LocationService for FailingLocation {
    async fn current_position(&self, _options: PositionOptions) -> Result<GeoCoordinate> {
        Err(anyhow!("User denied geolocation"))
    }
}

/// Answers after the given delay
pub struct SlowLocation(pub Duration);

impl LocationService for SlowLocation {
    async fn current_position(&self, _options: PositionOptions) -> Result<GeoCoordinate> {
        tokio::time::sleep(self.0).await;
        Ok(GeoCoordinate::new(37.5, 127.0))
    }
}

/// Map adapter that counts how many views were opened and are still alive
#[derive(Clone, Default)]
pub struct MockMap {
    pub opened: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    fail: bool,
}

impl MockMap {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn live_views(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

pub struct MockView {
    inner: HeadlessMapView,
    live: Arc<AtomicUsize>,
}

impl Drop for MockView {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MapView for MockView {
    fn place_marker(&mut self, kind: MarkerKind, position: GeoCoordinate) {
        self.inner.place_marker(kind, position);
    }

    fn fit_bounds(&mut self, points: &[GeoCoordinate]) {
        self.inner.fit_bounds(points);
    }

    fn distance(&self, a: &GeoCoordinate, b: &GeoCoordinate) -> f64 {
        self.inner.distance(a, b)
    }

    fn markers(&self) -> Vec<Marker> {
        self.inner.markers()
    }
}

impl MapAdapter for MockMap {
    type View = MockView;

    fn open(&self, _tiles: &TileSource) -> Result<Self::View> {
        if self.fail {
            return Err(anyhow!("Map container missing"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(MockView {
            inner: HeadlessMapView::default(),
            live: self.live.clone(),
        })
    }
}

#[derive(Clone, Default)]
pub struct CountingSender(Arc<AtomicUsize>);

impl CountingSender {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl StateUpdateSender for CountingSender {
    fn send_update(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockDiagnosisClient {
    result: Option<DiagnosisResult>,
    /// When set, every call waits for a notification before answering
    gated: bool,
    pub gate: Arc<Notify>,
    pub calls: Arc<AtomicUsize>,
}

impl MockDiagnosisClient {
    pub fn answering(result: DiagnosisResult) -> Self {
        Self {
            result: Some(result),
            gated: false,
            gate: Arc::new(Notify::new()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn gated(result: DiagnosisResult) -> Self {
        Self {
            gated: true,
            ..Self::answering(result)
        }
    }

    pub fn failing() -> Self {
        Self {
            result: None,
            ..Self::answering(DiagnosisResult {
                diagnosis: String::new(),
                severity: crate::Severity::Mild,
                action_tips: String::new(),
                estimated_time: String::new(),
            })
        }
    }
}

impl DiagnosisClient for MockDiagnosisClient {
    async fn diagnose(
        &self,
        _request: &DiagnosisRequest,
    ) -> Result<DiagnosisResult, DiagnosisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.gated {
            self.gate.notified().await;
        }
        self.result
            .clone()
            .ok_or_else(|| DiagnosisError::Unavailable(anyhow!("Connection refused")))
    }
}
