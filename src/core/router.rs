use crate::core::rules::{Rule, RuleInput, RuleSet};
use crate::domain::model::{Region, RoutingDecision};
use crate::utils::error::Result;

/// Deterministic procedure/scenario → protocol router.
///
/// Holds an immutable [`RuleSet`]; `route` is a pure function of its
/// arguments, so one router can be shared across threads.
#[derive(Debug, Clone)]
pub struct Router {
    rules: RuleSet,
}

impl Router {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn standard() -> Result<Self> {
        Ok(Self::new(RuleSet::standard()?))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Route one request. Unknown region text counts as no region; empty
    /// text simply matches nothing.
    pub fn route(&self, procedure_name: &str, scenario_name: &str, region: &str) -> RoutingDecision {
        self.route_in(procedure_name, scenario_name, Region::parse(region))
    }

    pub fn route_in(
        &self,
        procedure_name: &str,
        scenario_name: &str,
        region: Option<Region>,
    ) -> RoutingDecision {
        let input = RuleInput::new(procedure_name, scenario_name, region);
        match self.rules.first_match(&input) {
            Some(rule) => {
                tracing::trace!(rule = %rule.id, protocol = %rule.protocol, "rule fired");
                RoutingDecision::routed(rule.protocol.as_str(), rule.tier, rule.id.as_str())
            }
            None => RoutingDecision::unrouted(),
        }
    }

    /// Every rule whose guard holds, in cascade order. The first entry is
    /// the one `route` returns; the rest are shadowed.
    pub fn matching_rules(
        &self,
        procedure_name: &str,
        scenario_name: &str,
        region: Option<Region>,
    ) -> Vec<&Rule> {
        let input = RuleInput::new(procedure_name, scenario_name, region);
        self.rules.all_matches(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MatchTier;

    fn router() -> Router {
        Router::standard().unwrap()
    }

    fn routed(decision: &RoutingDecision) -> (Option<&str>, MatchTier) {
        (decision.protocol_name(), decision.match_tier())
    }

    #[test]
    fn test_prostate_routes_by_procedure() {
        let decision = router().route(
            "MRI prostate without and with IV contrast",
            "Elevated PSA, staging",
            "abdomen",
        );
        assert_eq!(routed(&decision), (Some("PROSTATE"), MatchTier::Procedure));
        assert_eq!(decision.rule(), Some("prostate"));
    }

    #[test]
    fn test_head_procedure_wins_over_seizure_scenario() {
        let decision = router().route("MRI head without IV contrast", "New onset seizure", "neuro");
        assert_eq!(routed(&decision), (Some("BRAIN"), MatchTier::Procedure));
    }

    #[test]
    fn test_forearm_mass_with_infection_context() {
        let decision = router().route("MRI soft tissue mass forearm", "infection, abscess", "msk");
        assert_eq!(
            routed(&decision),
            (Some("OSTEOMYELITIS"), MatchTier::ProcedureContext)
        );
    }

    #[test]
    fn test_thigh_tumor_context_beats_joint_fallback() {
        let r = router();
        let tumor = r.route(
            "MRI right thigh without contrast",
            "suspected osteosarcoma of the femur",
            "msk",
        );
        assert_eq!(routed(&tumor), (Some("BONE TUMOR"), MatchTier::ProcedureContext));

        let plain = r.route("MRI right thigh without contrast", "knee pain, no red flags", "msk");
        assert_eq!(routed(&plain), (Some("HIP"), MatchTier::Procedure));
    }

    #[test]
    fn test_extremity_context_order() {
        let r = router();
        // tumor beats infarct beats infection
        let d = r.route("MRI femur", "bone lesion with avascular necrosis and infection", "msk");
        assert_eq!(d.protocol_name(), Some("BONE TUMOR"));
        let d = r.route("MRI femur", "avascular necrosis, suspected infection", "msk");
        assert_eq!(d.protocol_name(), Some("OSTEONECROSIS"));
        let d = r.route("MRI femur", "septic patient", "msk");
        assert_eq!(d.protocol_name(), Some("OSTEOMYELITIS"));
    }

    #[test]
    fn test_extremity_joint_fallbacks() {
        let r = router();
        assert_eq!(r.route("MRI lower leg", "", "msk").protocol_name(), Some("KNEE"));
        assert_eq!(r.route("MRI tibia and fibula", "", "msk").protocol_name(), Some("KNEE"));
        assert_eq!(r.route("MRI forearm", "", "msk").protocol_name(), Some("ELBOW"));
        assert_eq!(r.route("MRI humerus", "", "msk").protocol_name(), Some("SHOULDER"));
        assert_eq!(
            r.route("MRI upper extremity (not joint)", "", "msk").protocol_name(),
            Some("SHOULDER")
        );
        assert_eq!(
            r.route("MRI lower extremity (not joint)", "", "msk").protocol_name(),
            Some("HIP")
        );
    }

    #[test]
    fn test_spine_infection_in_procedure_name_overrides_level() {
        let decision = router().route("MRI lumbar spine with discitis", "", "spine");
        assert_eq!(
            routed(&decision),
            (Some("SPINE INFECTION"), MatchTier::ProcedureContext)
        );
    }

    #[test]
    fn test_spine_infection_in_scenario_overrides_level() {
        let r = router();
        let d = r.route(
            "MRI cervical spine without and with IV contrast",
            "Suspected epidural abscess",
            "spine",
        );
        assert_eq!(routed(&d), (Some("SPINE INFECTION"), MatchTier::ProcedureContext));

        let d = r.route("MRI thoracic spine without IV contrast", "Back pain", "spine");
        assert_eq!(routed(&d), (Some("T-SPINE"), MatchTier::Procedure));
    }

    #[test]
    fn test_pelvis_excluded_when_spine_present() {
        let decision = router().route("MRI pelvis and lumbar spine", "Low back pain", "spine");
        assert_ne!(decision.protocol_name(), Some("PELVIS"));
        assert_eq!(routed(&decision), (Some("L-SPINE"), MatchTier::Procedure));
        assert_eq!(decision.rule(), Some("l-spine"));
    }

    #[test]
    fn test_multi_level_spine() {
        let r = router();
        assert_eq!(
            r.route("MRI complete spine without IV contrast", "Metastatic disease", "spine")
                .protocol_name(),
            Some("SCREENING SPINE")
        );
        assert_eq!(
            r.route("MRI cervical and lumbar spine", "Myelopathy", "spine")
                .protocol_name(),
            Some("SCREENING SPINE")
        );
        assert_eq!(
            r.route("MRI total spine", "Suspected discitis", "spine")
                .protocol_name(),
            Some("SPINE INFECTION")
        );
    }

    #[test]
    fn test_mutual_exclusion_guards() {
        let r = router();
        assert_eq!(
            r.route("MRI abdomen and pelvis", "", "abdomen").protocol_name(),
            Some("PELVIS")
        );
        assert_eq!(r.route("MRI abdomen", "", "abdomen").protocol_name(), Some("LIVER"));
        assert_eq!(r.route("MRI orbits face and neck", "", "neuro").protocol_name(), Some("ORBITS"));
        assert_eq!(r.route("MRI neck", "", "neuro").protocol_name(), Some("NECK SOFT TISSUE"));
        assert_eq!(
            r.route("MRI heart and chest", "", "chest").protocol_name(),
            Some("CARDIAC STRESS")
        );
        assert_eq!(r.route("MRI chest", "", "chest").protocol_name(), Some("CHEST"));
        assert_eq!(
            r.route("MRI hip and spine", "", "msk").protocol_name(),
            Some("L-SPINE")
        );
    }

    #[test]
    fn test_scenario_tier_neuro_rules() {
        let r = router();
        // no tier-1 anatomy in "MRA" so the neuro region scope applies
        let d = r.route("MRA", "Transient ischemic attack", "neuro");
        assert_eq!(routed(&d), (Some("TIA"), MatchTier::Scenario));
        let d = r.route("MRA", "Suspected TIA, first episode", "neuro");
        assert_eq!(d.protocol_name(), Some("TIA"));
        let d = r.route("MRA", "Acute ischemic stroke", "neuro");
        assert_eq!(d.protocol_name(), Some("BRAIN"));
        let d = r.route("MRA", "Known metastatic lesion", "neuro");
        assert_eq!(d.protocol_name(), Some("BRAIN TUMOR/INF"));
        let d = r.route("MRA", "Dementia workup", "neuro");
        assert_eq!(d.match_tier(), MatchTier::None);
        let d = r.route("MRA", "Suspected demyelinating disease", "neuro");
        assert_eq!(d.protocol_name(), Some("BRAIN MS"));
    }

    #[test]
    fn test_neuro_scenario_order() {
        let r = router();
        let d = r.route("MRA", "Pituitary adenoma follow-up", "neuro");
        assert_eq!(routed(&d), (Some("PITUITARY"), MatchTier::Scenario));
        let d = r.route("MRA", "Sellar region, visual field loss", "neuro");
        assert_eq!(d.protocol_name(), Some("PITUITARY"));

        // tumor 在 seizure 和 pituitary 之前
        let d = r.route("MRA", "Seizure with known brain tumor", "neuro");
        assert_eq!(routed(&d), (Some("BRAIN TUMOR/INF"), MatchTier::Scenario));
        let d = r.route("MRA", "Sellar mass", "neuro");
        assert_eq!(d.protocol_name(), Some("BRAIN TUMOR/INF"));
        let d = r.route("MRA", "Breakthrough seizure", "neuro");
        assert_eq!(d.protocol_name(), Some("SEIZURE"));

        let matched: Vec<&str> = r
            .matching_rules("MRA", "Seizure with known brain tumor", Some(Region::Neuro))
            .iter()
            .map(|rule| rule.id.as_str())
            .collect();
        assert_eq!(matched, vec!["neuro-tumor", "neuro-seizure"]);
    }

    #[test]
    fn test_scenario_tier_msk_and_spine_rules() {
        let r = router();
        let d = r.route("MRI area of interest", "Suspected septic arthritis", "msk");
        assert_eq!(routed(&d), (Some("OSTEOMYELITIS"), MatchTier::Scenario));
        let d = r.route("MRI area of interest", "Infection after brain surgery", "msk");
        assert_eq!(d.match_tier(), MatchTier::None);
        let d = r.route("MRI sacral region", "Spondylodiscitis", "spine");
        assert_eq!(routed(&d), (Some("SPINE INFECTION"), MatchTier::Scenario));
        let d = r.route("MRI spine", "Chronic back pain", "spine");
        assert_eq!(routed(&d), (Some("L-SPINE"), MatchTier::Fallback));
    }

    #[test]
    fn test_supplementary_anatomy() {
        let r = router();
        assert_eq!(r.route("MRI sacroiliac joints", "", "msk").protocol_name(), Some("SI JOINTS"));
        assert_eq!(
            r.route("MRI sacrum and coccyx", "Decubitus ulcer", "spine").protocol_name(),
            Some("SPINE INFECTION")
        );
        assert_eq!(r.route("MRI sacrum and coccyx", "", "spine").protocol_name(), Some("L-SPINE"));
        assert_eq!(
            r.route("MRI paranasal sinuses", "", "neuro").protocol_name(),
            Some("SINUSES")
        );
    }

    #[test]
    fn test_spine_levels_win_over_sacrum_and_si_joints() {
        let r = router();
        let d = r.route("MRI lumbar spine and sacrum", "Suspected discitis", "spine");
        assert_eq!(routed(&d), (Some("SPINE INFECTION"), MatchTier::ProcedureContext));
        let d = r.route("MRI lumbar spine and sacroiliac joints", "Low back pain", "spine");
        assert_eq!(routed(&d), (Some("L-SPINE"), MatchTier::Procedure));
        let d = r.route("MRI cervical spine and sacrum", "Myelopathy", "spine");
        assert_eq!(routed(&d), (Some("C-SPINE"), MatchTier::Procedure));
    }

    #[test]
    fn test_tier_one_shadows_scenario_rules() {
        // Stroke and TIA scenario rules are unreachable for head/brain
        // procedures because the BRAIN procedure rule fires first.
        let r = router();
        let d = r.route("MRI head without IV contrast", "Transient ischemic attack", "neuro");
        assert_eq!(routed(&d), (Some("BRAIN"), MatchTier::Procedure));

        let matches = r.matching_rules(
            "MRI head without IV contrast",
            "Transient ischemic attack",
            Some(Region::Neuro),
        );
        let ids: Vec<&str> = matches.iter().map(|rule| rule.id.as_str()).collect();
        assert_eq!(ids.first(), Some(&"brain"));
        assert!(ids.contains(&"neuro-tia"));
    }

    #[test]
    fn test_empty_inputs_are_unrouted() {
        let r = router();
        let d = r.route("", "", "");
        assert_eq!(d, RoutingDecision::unrouted());
        let d = r.route("", "acute stroke", "unknown-region");
        assert!(!d.is_routed());
        assert!(r.matching_rules("", "", None).is_empty());
    }

    #[test]
    fn test_closed_codomain_and_determinism() {
        let r = router();
        let cases = [
            ("MRI knee", "Meniscal tear", "msk"),
            ("MRA neck", "Carotid dissection", "vascular"),
            ("MRI fetal", "Anomaly", "peds"),
            ("MRI breast", "Screening", "breast"),
            ("", "", ""),
        ];
        for (procedure, scenario, region) in cases {
            let first = r.route(procedure, scenario, region);
            let second = r.route(procedure, scenario, region);
            assert_eq!(first, second);
            assert_eq!(first.protocol_name().is_none(), first.match_tier() == MatchTier::None);
        }
    }
}
