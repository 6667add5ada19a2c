use serde::{Deserialize, Serialize};

/// Seat counts for a single section of a course.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub available: u32,
    pub total: u32,
}

/// Outcome of one availability search: the ordered section list plus derived
/// totals. Produced fresh each check and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub sections: Vec<Section>,
    pub total_available: u32,
    pub has_availability: bool,
}

impl SearchResult {
    pub fn from_sections(sections: Vec<Section>) -> Self {
        let total_available = sections.iter().map(|s| s.available).sum();
        Self {
            sections,
            total_available,
            has_availability: total_available > 0,
        }
    }

    /// Sum of section capacities, recorded alongside notifications.
    pub fn total_seats(&self) -> u32 {
        self.sections.iter().map(|s| s.total).sum()
    }
}
