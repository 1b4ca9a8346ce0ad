use geojson::{Feature, GeoJson, Value};
use ordered_float::OrderedFloat;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use crate::common::{SimError, SimResult};
use crate::domains::streets::{GraphData, GraphSource, Position2D, VertexId};

type CoordKey = (OrderedFloat<f64>, OrderedFloat<f64>);

/// Imports LineString and MultiLineString features as street segments.
///
/// Identical coordinates collapse into one vertex, numbered in the order
/// they are first seen. Consecutive coordinates become edges in both
/// directions unless the feature has `"oneway": true`.
pub struct GeoJsonFileSource {
    path: PathBuf,
}

impl GeoJsonFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(text: &str) -> SimResult<GraphData> {
        let geojson = text
            .parse::<GeoJson>()
            .map_err(|e| SimError::bad_source(format!("invalid GeoJSON: {}", e)))?;
        let features = match geojson {
            GeoJson::FeatureCollection(collection) => collection.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(_) => {
                return Err(SimError::bad_source("expected a Feature or FeatureCollection"))
            }
        };

        let mut builder = GeoJsonGraphBuilder::default();
        for feature in &features {
            builder.add_feature(feature)?;
        }
        if builder.data.vertices.is_empty() {
            return Err(SimError::bad_source("no LineString features found"));
        }
        Ok(builder.data)
    }
}

impl GraphSource for GeoJsonFileSource {
    fn load(&self) -> SimResult<GraphData> {
        let text = fs::read_to_string(&self.path)
            .map_err(|e| SimError::bad_source(format!("{}: {}", self.path.display(), e)))?;
        Self::parse(&text)
    }
}

#[derive(Default)]
struct GeoJsonGraphBuilder {
    data: GraphData,
    ids: HashMap<CoordKey, VertexId>,
    edges: HashSet<(VertexId, VertexId)>,
}

impl GeoJsonGraphBuilder {
    fn add_feature(&mut self, feature: &Feature) -> SimResult<()> {
        let Some(geometry) = &feature.geometry else {
            return Ok(());
        };
        let oneway = feature
            .property("oneway")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        match &geometry.value {
            Value::LineString(line) => self.add_line(line, oneway),
            Value::MultiLineString(lines) => lines
                .iter()
                .try_for_each(|line| self.add_line(line, oneway)),
            _ => Ok(()),
        }
    }

    fn add_line(&mut self, line: &[Vec<f64>], oneway: bool) -> SimResult<()> {
        let mut previous: Option<(VertexId, Position2D)> = None;
        for coord in line {
            let (x, y) = match coord.as_slice() {
                [x, y, ..] => (*x, *y),
                _ => return Err(SimError::bad_source("coordinate with fewer than 2 values")),
            };
            let position = Position2D::new(x, y);
            let id = self.vertex_for(position);
            if let Some((prev_id, prev_pos)) = previous {
                if prev_id != id {
                    let length = prev_pos.distance_to(&position);
                    self.add_edge(prev_id, id, length);
                    if !oneway {
                        self.add_edge(id, prev_id, length);
                    }
                }
            }
            previous = Some((id, position));
        }
        Ok(())
    }

    fn vertex_for(&mut self, position: Position2D) -> VertexId {
        let key = (OrderedFloat(position.x), OrderedFloat(position.y));
        if let Some(id) = self.ids.get(&key) {
            return *id;
        }
        let id = self.data.vertices.len() as VertexId;
        self.ids.insert(key, id);
        self.data.vertex(id, position.x, position.y);
        id
    }

    fn add_edge(&mut self, source: VertexId, target: VertexId, length: f64) {
        if self.edges.insert((source, target)) {
            self.data.edge(source, target, length);
        }
    }
}
