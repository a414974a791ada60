//! Per-camera marker observation sets.

use std::collections::{btree_map::Entry, BTreeMap};

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ObservationError {
    #[error("marker id {id} observed more than once")]
    DuplicateId { id: u32 },
    #[error("observation for marker id {id} is not finite")]
    NonFinite { id: u32 },
    #[error("{ids} ids but {points} points")]
    LengthMismatch { ids: usize, points: usize },
}

/// One detected corner: identity plus sub-pixel position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerObservation {
    pub id: u32,
    pub x: f64,
    pub y: f64,
}

/// Marker identity -> pixel position for one camera and one frame.
///
/// Ids are unique within a set and iterate in ascending order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarkerObservations {
    points: BTreeMap<u32, Point2<f64>>,
}

impl MarkerObservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(id, position)` pairs; duplicate ids are rejected.
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (u32, Point2<f64>)>,
    ) -> Result<Self, ObservationError> {
        let mut set = Self::new();
        for (id, p) in pairs {
            set.insert(id, p)?;
        }
        Ok(set)
    }

    /// Build from the parallel `ids` / `corners` arrays a board detector returns.
    pub fn from_parallel(ids: &[u32], corners: &[Point2<f64>]) -> Result<Self, ObservationError> {
        if ids.len() != corners.len() {
            return Err(ObservationError::LengthMismatch {
                ids: ids.len(),
                points: corners.len(),
            });
        }
        Self::from_pairs(ids.iter().copied().zip(corners.iter().copied()))
    }

    pub fn insert(&mut self, id: u32, p: Point2<f64>) -> Result<(), ObservationError> {
        if !(p.x.is_finite() && p.y.is_finite()) {
            return Err(ObservationError::NonFinite { id });
        }
        match self.points.entry(id) {
            Entry::Occupied(_) => Err(ObservationError::DuplicateId { id }),
            Entry::Vacant(slot) => {
                slot.insert(p);
                Ok(())
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<Point2<f64>> {
        self.points.get(&id).copied()
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.points.keys().copied()
    }

    /// `(id, position)` in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Point2<f64>)> + '_ {
        self.points.iter().map(|(&id, &p)| (id, p))
    }

    /// Ids present in both sets, ascending.
    pub fn shared_ids(&self, other: &Self) -> Vec<u32> {
        // Walk the smaller map and look ids up in the larger one.
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .ids()
            .filter(|id| large.points.contains_key(id))
            .collect()
    }
}

impl Serialize for MarkerObservations {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let list: Vec<MarkerObservation> = self
            .iter()
            .map(|(id, p)| MarkerObservation { id, x: p.x, y: p.y })
            .collect();
        list.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MarkerObservations {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let list = Vec::<MarkerObservation>::deserialize(deserializer)?;
        Self::from_pairs(list.into_iter().map(|o| (o.id, Point2::new(o.x, o.y))))
            .map_err(serde::de::Error::custom)
    }
}
