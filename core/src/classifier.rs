use crate::types::{Priority, Thresholds};

/// Priority decision table. KEV membership wins outright; otherwise the two
/// scores are compared against their thresholds, with equality counting as
/// meeting the threshold.
///
/// | KEV | CVSS >= t | EPSS >= t | Priority |
/// |-----|-----------|-----------|----------|
/// | yes | -         | -         | P1+      |
/// | no  | yes       | yes       | P1       |
/// | no  | yes       | no        | P2       |
/// | no  | no        | yes       | P3       |
/// | no  | no        | no        | P4       |
pub fn classify(cisa_kev: bool, cvss_score: f64, epss_score: f64, thresholds: &Thresholds) -> Priority {
    if cisa_kev {
        return Priority::P1Plus;
    }

    let severe = cvss_score >= thresholds.cvss;
    let likely = epss_score >= thresholds.epss;

    match (severe, likely) {
        (true, true) => Priority::P1,
        (true, false) => Priority::P2,
        (false, true) => Priority::P3,
        (false, false) => Priority::P4,
    }
}
