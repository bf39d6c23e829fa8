use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{geo::haversine_meters, location::GeoCoordinate, prelude::*};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Where a map widget should fetch its tiles from
pub struct TileSource {
    /// URL template with `{z}`, `{x}`, `{y}` placeholders
    pub url_template: String,
    pub attribution: String,
    pub max_zoom: u8,
}

impl Default for TileSource {
    fn default() -> Self {
        Self {
            url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "&copy; OpenStreetMap contributors".to_string(),
            max_zoom: 19,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    /// The customer's position
    User,
    /// The technician on their way
    Technician,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub position: GeoCoordinate,
}

/// A live map on screen. Dropping the view tears it down.
pub trait MapView: Send + Sync {
    /// Place a marker, replacing any previous marker of the same kind
    fn place_marker(&mut self, kind: MarkerKind, position: GeoCoordinate);
    /// Adjust the viewport so all the given points are visible
    fn fit_bounds(&mut self, points: &[GeoCoordinate]);
    /// Distance in meters between two coordinates as measured by the widget
    fn distance(&self, a: &GeoCoordinate, b: &GeoCoordinate) -> f64;
    /// Current markers on the map
    fn markers(&self) -> Vec<Marker>;
}

/// Something that can allocate [MapView]s
pub trait MapAdapter: Send + Sync {
    type View: MapView;

    fn open(&self, tiles: &TileSource) -> Result<Self::View>;
}

/// Map that doesn't render anything, it only keeps track of what would be
/// drawn. Distances are measured with the haversine formula.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessMap;

#[derive(Debug, Clone, Default)]
pub struct HeadlessMapView {
    tiles: TileSource,
    markers: HashMap<MarkerKind, GeoCoordinate>,
    bounds: Option<(GeoCoordinate, GeoCoordinate)>,
}

impl HeadlessMapView {
    /// Tiles the view was opened with
    pub fn tiles(&self) -> &TileSource {
        &self.tiles
    }

    /// South-west and north-east corners of the last bounds fit
    pub fn bounds(&self) -> Option<(GeoCoordinate, GeoCoordinate)> {
        self.bounds
    }
}

impl MapView for HeadlessMapView {
    fn place_marker(&mut self, kind: MarkerKind, position: GeoCoordinate) {
        self.markers.insert(kind, position);
    }

    fn fit_bounds(&mut self, points: &[GeoCoordinate]) {
        self.bounds = points.iter().fold(None, |acc, p| {
            let (sw, ne) = acc.unwrap_or((*p, *p));
            Some((
                GeoCoordinate::new(sw.lat.min(p.lat), sw.long.min(p.long)),
                GeoCoordinate::new(ne.lat.max(p.lat), ne.long.max(p.long)),
            ))
        });
    }

    fn distance(&self, a: &GeoCoordinate, b: &GeoCoordinate) -> f64 {
        haversine_meters(a, b)
    }

    fn markers(&self) -> Vec<Marker> {
        let mut markers = self
            .markers
            .iter()
            .map(|(kind, position)| Marker {
                kind: *kind,
                position: *position,
            })
            .collect::<Vec<_>>();
        markers.sort_by_key(|m| m.kind as u8);
        markers
    }
}

impl MapAdapter for HeadlessMap {
    type View = HeadlessMapView;

    fn open(&self, tiles: &TileSource) -> Result<Self::View> {
        log::debug!("Opening headless map with tiles from {}", tiles.url_template);
        Ok(HeadlessMapView {
            tiles: tiles.clone(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_replaced() {
        let mut view = HeadlessMap.open(&TileSource::default()).unwrap();
        view.place_marker(MarkerKind::Technician, GeoCoordinate::new(1.0, 1.0));
        view.place_marker(MarkerKind::User, GeoCoordinate::new(0.0, 0.0));
        view.place_marker(MarkerKind::Technician, GeoCoordinate::new(0.5, 0.5));

        let markers = view.markers();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].kind, MarkerKind::User);
        assert_eq!(markers[1].position, GeoCoordinate::new(0.5, 0.5));
    }

    #[test]
    fn test_view_keeps_tiles() {
        let tiles = TileSource {
            url_template: "https://tiles.example.com/{z}/{x}/{y}.png".to_string(),
            attribution: "Example".to_string(),
            max_zoom: 17,
        };
        let view = HeadlessMap.open(&tiles).unwrap();
        assert_eq!(view.tiles(), &tiles);
    }

    #[test]
    fn test_fit_bounds() {
        let mut view = HeadlessMapView::default();
        view.fit_bounds(&[
            GeoCoordinate::new(37.5, 127.01),
            GeoCoordinate::new(37.51, 127.0),
        ]);
        let (sw, ne) = view.bounds().expect("No bounds");
        assert_eq!(sw, GeoCoordinate::new(37.5, 127.0));
        assert_eq!(ne, GeoCoordinate::new(37.51, 127.01));

        view.fit_bounds(&[]);
        assert!(view.bounds().is_none());
    }
}
