use crate::domain::model::Validation;
use std::collections::BTreeSet;

/// Anatomy keyword → substrings a correctly routed protocol name should
/// contain. Order only affects iteration, never the verdict.
#[derive(Debug, Clone)]
pub struct AnatomyTable {
    entries: Vec<(String, Vec<String>)>,
}

impl AnatomyTable {
    pub fn new(entries: Vec<(String, Vec<String>)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(keyword, expected)| {
                (
                    keyword.to_lowercase(),
                    expected.into_iter().map(|e| e.to_lowercase()).collect(),
                )
            })
            .collect();
        Self { entries }
    }

    pub fn standard() -> Self {
        const TABLE: &[(&str, &[&str])] = &[
            ("brain", &["brain", "neuro", "tia", "seizure", "ms", "tumor"]),
            (
                "head",
                &[
                    "brain", "neuro", "tia", "seizure", "ms", "tumor", "orbits", "iac", "tmj",
                    "sinus",
                ],
            ),
            ("spine", &["spine", "c-spine", "t-spine", "l-spine", "screening"]),
            ("cervical", &["spine", "c-spine", "screening", "infection"]),
            ("lumbar", &["spine", "l-spine", "screening", "infection"]),
            ("thoracic", &["spine", "t-spine", "screening", "infection"]),
            ("pelvis", &["pelvis", "prostate", "rectal"]),
            ("liver", &["liver", "mrcp"]),
            ("kidney", &["kidney", "renal"]),
            ("abdomen", &["liver", "abdomen", "kidney", "mrcp", "pancreas"]),
            ("knee", &["knee"]),
            ("shoulder", &["shoulder"]),
            ("hip", &["hip", "pelvis"]),
            ("ankle", &["ankle", "foot"]),
            ("wrist", &["wrist", "hand"]),
            ("breast", &["breast"]),
            ("heart", &["cardiac", "heart"]),
            ("cardiac", &["cardiac", "heart"]),
            ("sella", &["pituitary", "sella"]),
            ("pituitary", &["pituitary", "sella"]),
            ("orbit", &["orbit"]),
            ("iac", &["iac", "auditory"]),
            ("tmj", &["tmj", "temporomandibular"]),
        ];

        Self::new(
            TABLE
                .iter()
                .map(|(keyword, expected)| {
                    (
                        keyword.to_string(),
                        expected.iter().map(|e| e.to_string()).collect(),
                    )
                })
                .collect(),
        )
    }

    /// Union of expectations for every keyword found in `procedure_lower`.
    pub fn expectations(&self, procedure_lower: &str) -> BTreeSet<&str> {
        self.entries
            .iter()
            .filter(|(keyword, _)| procedure_lower.contains(keyword.as_str()))
            .flat_map(|(_, expected)| expected.iter().map(String::as_str))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Flags routed pairs whose protocol name matches none of the anatomy the
/// procedure names. Warnings only: nothing is corrected.
#[derive(Debug, Clone)]
pub struct RoutingValidator {
    table: AnatomyTable,
}

impl RoutingValidator {
    pub fn new(table: AnatomyTable) -> Self {
        Self { table }
    }

    pub fn standard() -> Self {
        Self::new(AnatomyTable::standard())
    }

    pub fn validate(&self, procedure_name: &str, routed_protocol: Option<&str>) -> Validation {
        let Some(protocol) = routed_protocol else {
            return Validation::consistent();
        };

        let procedure_lower = procedure_name.to_lowercase();
        let expected = self.table.expectations(&procedure_lower);
        if expected.is_empty() {
            return Validation::consistent();
        }

        let protocol_lower = protocol.to_lowercase();
        if expected.iter().any(|e| protocol_lower.contains(e)) {
            return Validation::consistent();
        }

        let expected_list = expected.iter().copied().collect::<Vec<_>>().join(", ");
        Validation {
            consistent: false,
            concerns: vec![format!(
                "Procedure '{}' routed to '{}' - expected one of: {{{}}}",
                procedure_name, protocol, expected_list
            )],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orbit_routed_to_liver_is_flagged() {
        let validator = RoutingValidator::standard();
        let result = validator.validate("MRI orbit without IV contrast", Some("LIVER"));
        assert!(!result.consistent);
        assert_eq!(result.concerns.len(), 1);
        assert_eq!(
            result.concerns[0],
            "Procedure 'MRI orbit without IV contrast' routed to 'LIVER' - expected one of: {orbit}"
        );
    }

    #[test]
    fn test_absent_protocol_is_trivially_consistent() {
        let validator = RoutingValidator::standard();
        let result = validator.validate("MRI orbit without IV contrast", None);
        assert!(result.consistent);
        assert!(result.concerns.is_empty());
    }

    #[test]
    fn test_procedure_without_known_anatomy_is_consistent() {
        let validator = RoutingValidator::standard();
        let result = validator.validate("MRA runoff", Some("LIVER"));
        assert!(result.consistent);
    }

    #[test]
    fn test_cervical_expectations() {
        let validator = RoutingValidator::standard();
        assert!(validator
            .validate("MRI cervical spine", Some("SPINE INFECTION"))
            .consistent);
        assert!(validator.validate("MRI cervical spine", Some("C-SPINE")).consistent);

        let result = validator.validate("MRI cervical spine", Some("BRAIN"));
        assert!(!result.consistent);
        assert!(result.concerns[0].contains("c-spine"));
        assert!(result.concerns[0].contains("screening"));
    }

    #[test]
    fn test_union_of_expectations_for_multiple_keywords() {
        let validator = RoutingValidator::standard();
        // "head" and "orbit" both present: matching either is enough
        assert!(validator.validate("MRI head and orbits", Some("ORBITS")).consistent);
        assert!(validator.validate("MRI head and orbits", Some("BRAIN")).consistent);
        let result = validator.validate("MRI head and orbits", Some("KNEE"));
        assert!(!result.consistent);
        assert!(result.concerns[0].contains("orbit"));
        assert!(result.concerns[0].contains("brain"));
    }

    #[test]
    fn test_case_insensitive_protocol_match() {
        let validator = RoutingValidator::standard();
        assert!(validator.validate("MRI Knee", Some("knee")).consistent);
        assert!(validator.validate("mri knee", Some("KNEE")).consistent);
    }

    #[test]
    fn test_custom_table() {
        let table = AnatomyTable::new(vec![("Thumb".to_string(), vec!["HAND".to_string()])]);
        assert_eq!(table.len(), 1);
        let validator = RoutingValidator::new(table);
        assert!(validator.validate("MRI thumb", Some("HAND")).consistent);
        assert!(!validator.validate("MRI thumb", Some("WRIST")).consistent);
    }
}
