//! Terms used across the dashboard views.

/// One glossary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Term {
    /// Lookup key, e.g. `storm-surge`.
    pub key: &'static str,
    pub title: &'static str,
    pub content: &'static str,
}

pub const TERMS: &[Term] = &[
    Term {
        key: "brrs",
        title: "Barangay Resilience Readiness Score (BRRS)",
        content: "A composite score (0-100) of how exposed and vulnerable a barangay is to \
                  climate hazards. Combines hazard exposure (40%), health sensitivity (30%) \
                  and adaptive capacity (30%). Higher scores mean greater vulnerability.",
    },
    Term {
        key: "risk-level",
        title: "Risk Level Classification",
        content: "Low (below 30): low exposure, well prepared. Medium (30 to below 50): \
                  moderate vulnerability, needs attention. High (50 and above): priority \
                  for interventions.",
    },
    Term {
        key: "hazard-exposure",
        title: "Hazard Exposure Score",
        content: "How exposed a barangay is to floods, storms, landslides and liquefaction. \
                  Based on NOAH flood maps, storm surge models and historical cyclone data. \
                  Accounts for 40% of the BRRS.",
    },
    Term {
        key: "health-sensitivity",
        title: "Health Sensitivity Score",
        content: "Vulnerability of the population from demographics (elderly, children, \
                  poverty rate) and environmental health such as air quality. Accounts for \
                  30% of the BRRS.",
    },
    Term {
        key: "adaptive-capacity",
        title: "Adaptive Capacity Score",
        content: "Resources available for response and recovery: healthcare facilities, \
                  evacuation centers and infrastructure. Accounts for 30% of the BRRS.",
    },
    Term {
        key: "flood-risk",
        title: "Flood Risk Assessment",
        content: "From NOAH flood hazard maps for 5-year, 25-year and 100-year scenarios; \
                  the share of barangay area at risk in each.",
    },
    Term {
        key: "storm-surge",
        title: "Storm Surge Risk",
        content: "Abnormal rise in sea level during tropical cyclones. Coastal barangays \
                  face flooding from surges. Based on PAGASA Storm Surge Advisory levels 1-4.",
    },
    Term {
        key: "landslide",
        title: "Landslide Susceptibility",
        content: "Risk of soil and rock sliding down slopes during heavy rain or \
                  earthquakes. Mountainous and hilly areas are most at risk.",
    },
    Term {
        key: "liquefaction",
        title: "Liquefaction Susceptibility",
        content: "Earthquake shaking makes water-saturated soil behave like a liquid and \
                  lose strength, so buildings can sink or tilt. Coastal and low-lying sandy \
                  areas are most at risk.",
    },
    Term {
        key: "air-quality",
        title: "Air Quality Index (AQI)",
        content: "Air pollution level on a 1 to 5 scale: 1-2 Good/Fair, 3 Moderate, \
                  4-5 Poor/Very Poor. Poor air raises health sensitivity.",
    },
    Term {
        key: "coastal",
        title: "Coastal Barangay",
        content: "Barangays along the coastline carry extra risk from storm surge, sea \
                  level rise and erosion, and need measures like mangrove protection.",
    },
];

/// Find a term by key or title, ignoring case, spaces and underscores.
pub fn lookup(query: &str) -> Option<&'static Term> {
    let wanted = normalize(query);
    TERMS
        .iter()
        .find(|term| normalize(term.key) == wanted || normalize(term.title) == wanted)
}

fn normalize(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| match c {
            ' ' | '_' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}
