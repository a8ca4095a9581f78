//! Static track topology.
//!
//! The graph is built once at load time and never mutated by runtime logic;
//! topology updates are an operations concern handled by restarting the
//! scheduler with a new network definition. All queries fail with
//! [`UnknownSection`] when given an unregistered id rather than silently
//! returning an empty answer, because an unknown id is a data error the
//! caller must surface.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Section, SectionId, Track};

/// Error returned when a graph query names a section that was never
/// registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown section: {0}")]
pub struct UnknownSection(pub SectionId);

/// Result type for graph queries.
pub type Result<T> = std::result::Result<T, UnknownSection>;

/// The static section/junction topology of one network region.
///
/// Sections are stored in a `BTreeMap` so that every iteration over the
/// network is in deterministic id order; the conflict detector depends on
/// this for reproducible output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackGraph {
    sections: BTreeMap<SectionId, Section>,

    /// Neighbors reachable via a single junction, in junction layout order.
    adjacency: BTreeMap<SectionId, Vec<SectionId>>,
}

impl TrackGraph {
    /// Builds a graph from section definitions and junction links.
    ///
    /// Links are directed; register both directions for bidirectional
    /// junctions. Fails if a link names a section that is not in `sections`.
    pub fn new(
        sections: Vec<Section>,
        links: Vec<(SectionId, SectionId)>,
    ) -> Result<Self> {
        let sections: BTreeMap<SectionId, Section> =
            sections.into_iter().map(|s| (s.id.clone(), s)).collect();

        let mut adjacency: BTreeMap<SectionId, Vec<SectionId>> =
            sections.keys().map(|id| (id.clone(), Vec::new())).collect();

        for (from, to) in links {
            if !sections.contains_key(&to) {
                return Err(UnknownSection(to));
            }
            let neighbors = adjacency
                .get_mut(&from)
                .ok_or_else(|| UnknownSection(from.clone()))?;
            if !neighbors.contains(&to) {
                neighbors.push(to);
            }
        }

        Ok(TrackGraph { sections, adjacency })
    }

    /// Looks up a section definition.
    pub fn section(&self, id: &SectionId) -> Result<&Section> {
        self.sections
            .get(id)
            .ok_or_else(|| UnknownSection(id.clone()))
    }

    /// Returns true without failing if the section is registered.
    pub fn contains(&self, id: &SectionId) -> bool {
        self.sections.contains_key(id)
    }

    /// Sections reachable from `id` via a single junction, in layout order.
    pub fn neighbors(&self, id: &SectionId) -> Result<&[SectionId]> {
        self.adjacency
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| UnknownSection(id.clone()))
    }

    /// Neighbors that can actually carry traffic: at least one active track.
    ///
    /// This is the candidate set for the reroute strategy; blocked and
    /// maintenance tracks exclude a section from routing.
    pub fn routable_neighbors(&self, id: &SectionId) -> Result<Vec<&SectionId>> {
        let neighbors = self.neighbors(id)?;
        Ok(neighbors
            .iter()
            .filter(|n| {
                self.sections
                    .get(*n)
                    .is_some_and(Section::has_routable_track)
            })
            .collect())
    }

    /// The tracks within a section.
    pub fn tracks_of(&self, id: &SectionId) -> Result<&[Track]> {
        Ok(self.section(id)?.tracks.as_slice())
    }

    /// The capacity of a section.
    pub fn capacity_of(&self, id: &SectionId) -> Result<usize> {
        Ok(self.section(id)?.capacity)
    }

    /// All sections in deterministic id order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    /// Number of registered sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Returns true if `from` and `to` are joined by a junction.
    pub fn are_adjacent(&self, from: &SectionId, to: &SectionId) -> Result<bool> {
        Ok(self.neighbors(from)?.contains(to))
    }
}
