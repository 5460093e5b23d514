use serde::{Deserialize, Serialize};

/// Vertical coordinate a group of levels is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerticalCoordinateType {
    Unknown,
    Pressure,
    Sigma,
    Eta,
    Hybrid,
    /// Staggered hybrid family (vcodes 5002 to 5005)
    HybridStaggered,
}

impl VerticalCoordinateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerticalCoordinateType::Unknown => "UNKNOWN",
            VerticalCoordinateType::Pressure => "PRESSURE",
            VerticalCoordinateType::Sigma => "SIGMA",
            VerticalCoordinateType::Eta => "ETA",
            VerticalCoordinateType::Hybrid => "HYBRID",
            VerticalCoordinateType::HybridStaggered => "HYBRID_STAGGERED",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, VerticalCoordinateType::Unknown)
    }
}

impl std::fmt::Display for VerticalCoordinateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
