//! Data-driven location authoring.
//!
//! Hosts can declare target locations as JSON instead of constructing
//! [`Location`]s in code. A [`LocationSpec`] is the serializable form;
//! realizing it creates an initially-inactive scene node for the
//! location's content.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::anchor::AnchorPayload;
use crate::coord::{CoordError, GeoPoint};
use crate::scene::SceneGraph;

use super::Location;

/// Errors from parsing or realizing authored locations.
#[derive(Debug, Error)]
pub enum AuthoringError {
    /// The JSON could not be parsed.
    #[error("invalid location JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The spec's coordinates are out of range.
    #[error("location '{name}': {source}")]
    Coord {
        /// Name of the offending spec.
        name: String,
        /// The underlying validation failure.
        source: CoordError,
    },

    /// Latitude and longitude must be given together or not at all.
    #[error("location '{0}' has only one of latitude/longitude")]
    PartialCoordinates(String),
}

/// Serializable description of a target location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSpec {
    /// Human-readable name.
    pub name: String,
    /// Anchor payload as a string, if the location is trackable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Latitude in degrees; requires `longitude`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude in degrees; requires `latitude`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl LocationSpec {
    /// Parse a JSON array of specs.
    pub fn from_json(json: &str) -> Result<Vec<Self>, AuthoringError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Realize the spec into a [`Location`] with a fresh, inactive scene
    /// node.
    pub fn realize(&self, scene: &dyn SceneGraph) -> Result<Location, AuthoringError> {
        let geo = match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => {
                Some(
                    GeoPoint::new(lat, lon).map_err(|source| AuthoringError::Coord {
                        name: self.name.clone(),
                        source,
                    })?,
                )
            }
            (None, None) => None,
            _ => return Err(AuthoringError::PartialCoordinates(self.name.clone())),
        };

        let node = scene.create_node(&self.name);
        scene.set_active(node, false);

        let payload = self.payload.as_ref().map(|p| AnchorPayload::from(p.clone()));
        Ok(Location::new(self.name.clone(), payload, geo, node))
    }

    /// Realize a batch of specs in order.
    ///
    /// Fails on the first invalid spec; nodes created for earlier specs in
    /// the batch are destroyed again so a failed load leaves no residue.
    pub fn realize_all(
        specs: &[Self],
        scene: &dyn SceneGraph,
    ) -> Result<Vec<Location>, AuthoringError> {
        let mut locations = Vec::with_capacity(specs.len());
        for spec in specs {
            match spec.realize(scene) {
                Ok(location) => locations.push(location),
                Err(e) => {
                    for location in &locations {
                        scene.destroy_node(location.node);
                    }
                    return Err(e);
                }
            }
        }
        Ok(locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemorySceneGraph;

    #[test]
    fn test_parse_and_realize_from_json() {
        let json = r#"[
            {"name": "museum", "payload": "m-pay", "latitude": 40.7794, "longitude": -73.9632},
            {"name": "unnamed-corner"}
        ]"#;
        let scene = MemorySceneGraph::new();

        let specs = LocationSpec::from_json(json).expect("JSON should parse");
        let locations = LocationSpec::realize_all(&specs, &scene).expect("Specs should realize");

        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].name, "museum");
        assert!(locations[0].is_trackable());
        assert!(locations[0].geo.is_some());
        assert!(!locations[1].is_trackable());
        assert_eq!(locations[1].geo, None);

        // Realized nodes start inactive.
        for location in &locations {
            assert!(scene.exists(location.node));
            assert!(!scene.is_active(location.node));
        }
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(matches!(
            LocationSpec::from_json("not json"),
            Err(AuthoringError::Json(_))
        ));
    }

    #[test]
    fn test_partial_coordinates_are_rejected() {
        let spec = LocationSpec {
            name: "half".to_string(),
            payload: None,
            latitude: Some(10.0),
            longitude: None,
        };
        let scene = MemorySceneGraph::new();

        let result = spec.realize(&scene);

        assert!(matches!(result, Err(AuthoringError::PartialCoordinates(_))));
        assert_eq!(scene.node_count(), 0, "No node for a rejected spec");
    }

    #[test]
    fn test_out_of_range_coordinates_are_rejected() {
        let spec = LocationSpec {
            name: "nowhere".to_string(),
            payload: Some("p".to_string()),
            latitude: Some(123.0),
            longitude: Some(0.0),
        };
        let scene = MemorySceneGraph::new();

        assert!(matches!(
            spec.realize(&scene),
            Err(AuthoringError::Coord { .. })
        ));
    }

    #[test]
    fn test_failed_batch_leaves_no_nodes_behind() {
        let specs = vec![
            LocationSpec {
                name: "good".to_string(),
                payload: Some("p".to_string()),
                latitude: None,
                longitude: None,
            },
            LocationSpec {
                name: "bad".to_string(),
                payload: None,
                latitude: Some(500.0),
                longitude: Some(0.0),
            },
        ];
        let scene = MemorySceneGraph::new();

        assert!(LocationSpec::realize_all(&specs, &scene).is_err());
        assert_eq!(scene.node_count(), 0, "Partial batch must be rolled back");
    }

    #[test]
    fn test_spec_round_trips_through_json() {
        let spec = LocationSpec {
            name: "pier".to_string(),
            payload: Some("pier-pay".to_string()),
            latitude: Some(36.6191),
            longitude: Some(-121.9018),
        };
        let json = serde_json::to_string(&vec![spec.clone()]).unwrap();
        let parsed = LocationSpec::from_json(&json).unwrap();
        assert_eq!(parsed, vec![spec]);
    }
}
