//! Narrative shown next to a classified row. This is a fixed template per
//! label, not the model's reasoning, which the engine never sees.

use serde::Serialize;

use crate::record::{Classification, PredictionRow};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub title: &'static str,
    /// Row confidence as a percentage with one decimal, e.g. `"87.5"`.
    pub confidence: String,
    pub reasoning: &'static [&'static str],
    pub recommendations: &'static [&'static str],
    pub color: &'static str,
}

const CONFIRMED_REASONING: &[&str] = &[
    "Strong periodic transit signal detected with high signal-to-noise ratio",
    "Transit depth and duration consistent with planetary characteristics",
    "Multiple validation checks passed including centroid motion analysis",
    "Statistical significance exceeds 5-sigma threshold",
    "Light curve shows clear ingress and egress patterns",
];

const CONFIRMED_RECOMMENDATIONS: &[&str] = &[
    "Schedule follow-up observations with larger telescopes",
    "Perform radial velocity measurements for mass determination",
    "Submit for official confirmation to exoplanet archives",
    "Monitor for additional transits to refine orbital parameters",
];

const CANDIDATE_REASONING: &[&str] = &[
    "Promising transit-like signal detected but requires verification",
    "Moderate signal-to-noise ratio with some background noise",
    "Orbital period shows consistency with known exoplanet distributions",
    "Secondary eclipse not detected (supports planetary hypothesis)",
    "Further observations needed to rule out false positives",
];

const CANDIDATE_RECOMMENDATIONS: &[&str] = &[
    "Conduct additional photometric observations",
    "Perform speckle imaging to check for nearby contaminants",
    "Analyze centroid shifts to verify source location",
    "Compare with known variable star catalogs",
];

const FALSE_POSITIVE_REASONING: &[&str] = &[
    "Signal characteristics inconsistent with planetary transits",
    "High probability of instrumental artifacts or systematic errors",
    "Light curve shows irregular patterns suggesting stellar variability",
    "Depth-to-duration ratio outside expected planetary ranges",
    "No corresponding signal in other validation pipelines",
];

const FALSE_POSITIVE_RECOMMENDATIONS: &[&str] = &[
    "Review raw data for instrumental issues",
    "Check for nearby bright stars causing contamination",
    "Analyze different quarters for consistency",
    "Compare with known eclipsing binary patterns",
];

pub fn title(class: Classification) -> &'static str {
    match class {
        Classification::Confirmed => "🌍 CONFIRMED EXOPLANET DETECTION",
        Classification::Candidate => "🔍 POTENTIAL EXOPLANET CANDIDATE",
        Classification::FalsePositive => "❌ LIKELY FALSE POSITIVE",
    }
}

pub fn explain(row: &PredictionRow) -> Report {
    let (reasoning, recommendations) = match row.prediction {
        Classification::Confirmed => (CONFIRMED_REASONING, CONFIRMED_RECOMMENDATIONS),
        Classification::Candidate => (CANDIDATE_REASONING, CANDIDATE_RECOMMENDATIONS),
        Classification::FalsePositive => (FALSE_POSITIVE_REASONING, FALSE_POSITIVE_RECOMMENDATIONS),
    };

    Report {
        title: title(row.prediction),
        confidence: format!("{:.1}", row.confidence * 100.0),
        reasoning,
        recommendations,
        color: row.prediction.color(),
    }
}
