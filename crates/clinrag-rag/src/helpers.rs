//! Auxiliary in-chat helpers: drug-interaction and ICD-10 lookups over small
//! bundled static tables. Drug interactions are matched by exact
//! case-insensitive name; ICD-10 descriptions are fuzzy-matched with
//! `strsim`. Neither helper touches ingestion or the Vector KB — placeholder
//! data assets only, not a clinical source.

use strsim::jaro_winkler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    High,
    Moderate,
    Low,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "HIGH",
            Severity::Moderate => "MODERATE",
            Severity::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DrugInteraction {
    pub drug_a: String,
    pub drug_b: String,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct Icd10Entry {
    pub code: String,
    pub description: String,
    pub category: String,
}

/// Small bundled interaction table. Not sourced from any real drug database;
/// a placeholder data asset exposed only through the documented I/O shape.
fn interaction_table() -> &'static [(&'static str, &'static str, Severity, &'static str)] {
    &[
        ("warfarin", "aspirin", Severity::High, "increased bleeding risk"),
        ("warfarin", "ibuprofen", Severity::High, "increased bleeding risk"),
        ("metformin", "contrast dye", Severity::Moderate, "risk of lactic acidosis"),
        ("lisinopril", "potassium", Severity::Moderate, "risk of hyperkalemia"),
        ("simvastatin", "clarithromycin", Severity::High, "increased risk of myopathy"),
        ("sertraline", "tramadol", Severity::High, "risk of serotonin syndrome"),
    ]
}

fn icd10_table() -> &'static [(&'static str, &'static str, &'static str)] {
    &[
        ("I10", "Essential (primary) hypertension", "Diseases of the circulatory system"),
        ("E11.9", "Type 2 diabetes mellitus without complications", "Endocrine, nutritional and metabolic diseases"),
        ("J45.909", "Unspecified asthma, uncomplicated", "Diseases of the respiratory system"),
        ("K21.9", "Gastro-esophageal reflux disease without esophagitis", "Diseases of the digestive system"),
        ("M54.5", "Low back pain", "Diseases of the musculoskeletal system and connective tissue"),
        ("N39.0", "Urinary tract infection, site not specified", "Diseases of the genitourinary system"),
        ("R07.9", "Chest pain, unspecified", "Symptoms, signs and abnormal clinical and laboratory findings"),
        ("J18.9", "Pneumonia, unspecified organism", "Diseases of the respiratory system"),
    ]
}

/// Checks each unordered pair in `drugs` against the bundled interaction
/// table using case-insensitive exact match on drug name.
pub fn check_drug_interactions(drugs: &[String]) -> Vec<DrugInteraction> {
    let normalized: Vec<String> = drugs.iter().map(|d| d.to_lowercase()).collect();
    let mut hits = Vec::new();
    for (a, b, severity, description) in interaction_table() {
        let has_a = normalized.iter().any(|d| d == a);
        let has_b = normalized.iter().any(|d| d == b);
        if has_a && has_b {
            hits.push(DrugInteraction {
                drug_a: (*a).to_string(),
                drug_b: (*b).to_string(),
                severity: *severity,
                description: (*description).to_string(),
            });
        }
    }
    hits
}

/// Fuzzy-matches `query` against ICD-10 descriptions (Jaro-Winkler), ranked
/// descending, top `k`.
pub fn icd10_search(query: &str, k: usize) -> Vec<Icd10Entry> {
    let query = query.to_lowercase();
    let mut scored: Vec<(f64, Icd10Entry)> = icd10_table()
        .iter()
        .map(|(code, description, category)| {
            let score = jaro_winkler(&query, &description.to_lowercase());
            (
                score,
                Icd10Entry {
                    code: (*code).to_string(),
                    description: (*description).to_string(),
                    category: (*category).to_string(),
                },
            )
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(k).map(|(_, entry)| entry).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_known_interaction_regardless_of_order() {
        let hits = check_drug_interactions(&["Aspirin".to_string(), "Warfarin".to_string()]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].severity, Severity::High);
    }

    #[test]
    fn no_interaction_for_unrelated_drugs() {
        assert!(check_drug_interactions(&["acetaminophen".to_string()]).is_empty());
    }

    #[test]
    fn icd10_search_ranks_closest_match_first() {
        let hits = icd10_search("hypertension", 3);
        assert_eq!(hits[0].code, "I10");
        assert_eq!(hits[0].category, "Diseases of the circulatory system");
    }
}
