use serde::{Deserialize, Serialize};

pub const DEFAULT_CVSS_THRESHOLD: f64 = 6.0;
pub const DEFAULT_EPSS_THRESHOLD: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    #[serde(rename = "Priority 1+")]
    P1Plus,
    #[serde(rename = "Priority 1")]
    P1,
    #[serde(rename = "Priority 2")]
    P2,
    #[serde(rename = "Priority 3")]
    P3,
    #[serde(rename = "Priority 4")]
    P4,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::P1Plus,
        Priority::P1,
        Priority::P2,
        Priority::P3,
        Priority::P4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::P1Plus => "Priority 1+",
            Priority::P1 => "Priority 1",
            Priority::P2 => "Priority 2",
            Priority::P3 => "Priority 3",
            Priority::P4 => "Priority 4",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cut-off scores for the priority decision table. A score equal to its
/// threshold counts as meeting it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub cvss: f64,
    pub epss: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cvss: DEFAULT_CVSS_THRESHOLD,
            epss: DEFAULT_EPSS_THRESHOLD,
        }
    }
}

impl Thresholds {
    pub fn new(cvss: f64, epss: f64) -> Self {
        Self { cvss, epss }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(0.0..=10.0).contains(&self.cvss) {
            errors.push(format!("cvss threshold must be within 0..=10, got {}", self.cvss));
        }
        if !(0.0..=1.0).contains(&self.epss) {
            errors.push(format!("epss threshold must be within 0..=1, got {}", self.epss));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_labels() {
        let json = serde_json::to_string(&Priority::P1Plus).unwrap();
        assert_eq!(json, "\"Priority 1+\"");
        let back: Priority = serde_json::from_str("\"Priority 3\"").unwrap();
        assert_eq!(back, Priority::P3);
    }

    #[test]
    fn rejects_out_of_range_and_nan_thresholds() {
        assert!(Thresholds::default().validate().is_empty());
        assert_eq!(Thresholds::new(11.0, 0.2).validate().len(), 1);
        assert_eq!(Thresholds::new(f64::NAN, f64::NAN).validate().len(), 2);
    }
}
