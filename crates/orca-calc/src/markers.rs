use std::collections::BTreeMap;

use serde::Serialize;

use orca_model::Point;

/// Labelled polylines produced by a reference rule.
///
/// Most entries are two-point segments; landmarks and along-line markers are
/// single points.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReferenceMarkers(BTreeMap<String, Vec<Point>>);

impl ReferenceMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, points: Vec<Point>) {
        self.0.insert(label.into(), points);
    }

    pub fn insert_segment(&mut self, label: impl Into<String>, start: Point, end: Point) {
        self.insert(label, vec![start, end]);
    }

    pub fn get(&self, label: &str) -> Option<&[Point]> {
        self.0.get(label).map(Vec::as_slice)
    }

    /// The entry under `label` if it is a two-point segment.
    pub fn segment(&self, label: &str) -> Option<(Point, Point)> {
        match self.get(label)? {
            [start, end] => Some((*start, *end)),
            _ => None,
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Point])> {
        self.0
            .iter()
            .map(|(label, points)| (label.as_str(), points.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
