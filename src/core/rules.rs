use crate::core::text::{NormalizedText, WordPattern};
use crate::domain::model::{MatchTier, Region};
use crate::utils::error::Result;
use std::collections::BTreeSet;

/// Normalised inputs a rule condition is evaluated against.
#[derive(Debug, Clone)]
pub struct RuleInput {
    pub procedure: NormalizedText,
    pub scenario: NormalizedText,
    pub region: Option<Region>,
}

impl RuleInput {
    pub fn new(procedure_name: &str, scenario_name: &str, region: Option<Region>) -> Self {
        Self {
            procedure: NormalizedText::new(procedure_name),
            scenario: NormalizedText::new(scenario_name),
            region,
        }
    }
}

/// Guard of a single rule. Leaves test one text field, the combinators
/// build the exclusion guards.
#[derive(Debug, Clone)]
pub enum Condition {
    ProcedureAny(Vec<String>),
    ScenarioAny(Vec<String>),
    ScenarioWord(WordPattern),
    RegionIs(Region),
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn holds(&self, input: &RuleInput) -> bool {
        match self {
            Condition::ProcedureAny(keywords) => input.procedure.contains_any(keywords),
            Condition::ScenarioAny(keywords) => input.scenario.contains_any(keywords),
            Condition::ScenarioWord(pattern) => input.scenario.contains_word(pattern),
            Condition::RegionIs(region) => input.region == Some(*region),
            Condition::All(parts) => parts.iter().all(|c| c.holds(input)),
            Condition::Any(parts) => parts.iter().any(|c| c.holds(input)),
            Condition::Not(inner) => !inner.holds(input),
        }
    }
}

fn words(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(|k| k.to_string()).collect()
}

pub fn procedure_any(keywords: &[&str]) -> Condition {
    Condition::ProcedureAny(words(keywords))
}

pub fn procedure_has(keyword: &str) -> Condition {
    Condition::ProcedureAny(vec![keyword.to_string()])
}

pub fn scenario_any(keywords: &[&str]) -> Condition {
    Condition::ScenarioAny(words(keywords))
}

pub fn scenario_word(word: &str) -> Result<Condition> {
    Ok(Condition::ScenarioWord(WordPattern::new(word)?))
}

pub fn region_is(region: Region) -> Condition {
    Condition::RegionIs(region)
}

pub fn all(parts: Vec<Condition>) -> Condition {
    Condition::All(parts)
}

pub fn any(parts: Vec<Condition>) -> Condition {
    Condition::Any(parts)
}

pub fn not(inner: Condition) -> Condition {
    Condition::Not(Box::new(inner))
}

/// Partition of the cascade. Purely descriptive: evaluation order is the
/// order of the rule list, not the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleGroup {
    ProcedureOnly,
    ProcedureContext,
    Spine,
    ScenarioOnly,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub group: RuleGroup,
    pub condition: Condition,
    pub protocol: String,
    pub tier: MatchTier,
}

impl Rule {
    pub fn new(
        id: &str,
        group: RuleGroup,
        condition: Condition,
        protocol: &str,
        tier: MatchTier,
    ) -> Self {
        Self {
            id: id.to_string(),
            group,
            condition,
            protocol: protocol.to_string(),
            tier,
        }
    }

    pub fn matches(&self, input: &RuleInput) -> bool {
        self.condition.holds(input)
    }
}

// 關鍵字表
const EXTREMITY_BONE: [&str; 10] = [
    "thigh",
    "femur",
    "forearm",
    "humerus",
    "upper arm",
    "lower leg",
    "tibia",
    "fibula",
    "lower extremity",
    "upper extremity",
];
const BONE_TUMOR_CONTEXT: [&str; 8] = [
    "tumor",
    "mass",
    "metasta",
    "sarcoma",
    "cancer",
    "malignant",
    "neoplasm",
    "lesion",
];
const BONE_INFARCT_CONTEXT: [&str; 4] = ["osteonecrosis", "avascular", "avn", "bone infarct"];
const BONE_INFECTION_CONTEXT: [&str; 4] = ["infection", "osteomyelitis", "septic", "abscess"];
const SPINE_INFECTION_CONTEXT: [&str; 3] = ["infection", "discitis", "abscess"];
const SACRAL_INFECTION_CONTEXT: [&str; 3] = ["infection", "abscess", "decubitus"];

const NEURO_PROCEDURE: [&str; 6] = ["head", "brain", "iac", "orbit", "sella", "pituitary"];
const SPINE_PROCEDURE: [&str; 5] = ["spine", "cervical", "thoracic", "lumbar", "sacr"];
const MSK_PROCEDURE: [&str; 11] = [
    "knee",
    "shoulder",
    "hip",
    "ankle",
    "wrist",
    "elbow",
    "extremity",
    "foot",
    "hand",
    "femur",
    "tibia",
];

/// Ordered, immutable rule table. First match wins.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The production rule table.
    pub fn standard() -> Result<Self> {
        let mut rules = Vec::new();
        rules.extend(procedure_rules());
        rules.extend(extremity_rules());
        rules.extend(spine_rules());
        rules.extend(supplementary_rules());
        rules.extend(scenario_rules()?);
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Every protocol identifier the table can emit.
    pub fn protocol_names(&self) -> BTreeSet<&str> {
        self.rules.iter().map(|r| r.protocol.as_str()).collect()
    }

    pub fn first_match(&self, input: &RuleInput) -> Option<&Rule> {
        self.rules.iter().find(|r| r.matches(input))
    }

    pub fn all_matches(&self, input: &RuleInput) -> Vec<&Rule> {
        self.rules.iter().filter(|r| r.matches(input)).collect()
    }
}

fn procedure_rule(id: &str, condition: Condition, protocol: &str) -> Rule {
    Rule::new(id, RuleGroup::ProcedureOnly, condition, protocol, MatchTier::Procedure)
}

/// Tier 1: anatomy keywords in the procedure name, with exclusion guards
/// for overlapping regions.
fn procedure_rules() -> Vec<Rule> {
    vec![
        procedure_rule("prostate", procedure_has("prostate"), "PROSTATE"),
        procedure_rule("liver", procedure_has("liver"), "LIVER"),
        procedure_rule("kidneys", procedure_any(&["kidney", "renal"]), "KIDNEYS"),
        procedure_rule(
            "mrcp",
            procedure_any(&["mrcp", "cholangiopancreatography"]),
            "MRCP",
        ),
        procedure_rule(
            "enterography",
            procedure_any(&["enterography", "enteroclysis"]),
            "MR ENTEROGRAPHY",
        ),
        procedure_rule(
            "pelvis",
            all(vec![procedure_has("pelvis"), not(procedure_has("spine"))]),
            "PELVIS",
        ),
        procedure_rule(
            "abdomen",
            all(vec![procedure_has("abdomen"), not(procedure_has("pelvis"))]),
            "LIVER",
        ),
        procedure_rule(
            "pituitary",
            procedure_any(&["sella", "pituitary"]),
            "PITUITARY",
        ),
        // " iac" keeps "sacroiliac" out
        procedure_rule(
            "iac",
            procedure_any(&["internal auditory", " iac"]),
            "IAC",
        ),
        procedure_rule("orbits", procedure_has("orbit"), "ORBITS"),
        procedure_rule("tmj", procedure_any(&["temporomandibular", "tmj"]), "TMJ"),
        procedure_rule(
            "neck",
            all(vec![procedure_has("neck"), not(procedure_has("orbit"))]),
            "NECK SOFT TISSUE",
        ),
        procedure_rule(
            "brachial-plexus",
            procedure_has("brachial plexus"),
            "BRACHIAL PLEXUS",
        ),
        procedure_rule(
            "brain",
            all(vec![
                procedure_any(&["head", "brain"]),
                not(procedure_any(&["orbit", "iac", "sella", "tmj", "neck"])),
            ]),
            "BRAIN",
        ),
        procedure_rule(
            "cardiac",
            procedure_any(&["heart", "cardiac"]),
            "CARDIAC STRESS",
        ),
        procedure_rule("breast", procedure_has("breast"), "BREAST"),
        procedure_rule(
            "chest",
            all(vec![procedure_has("chest"), not(procedure_has("heart"))]),
            "CHEST",
        ),
        procedure_rule("knee", procedure_has("knee"), "KNEE"),
        procedure_rule("shoulder", procedure_has("shoulder"), "SHOULDER"),
        procedure_rule(
            "hip",
            all(vec![procedure_has("hip"), not(procedure_has("spine"))]),
            "HIP",
        ),
        procedure_rule("ankle", procedure_any(&["ankle", "foot"]), "ANKLE"),
        procedure_rule("wrist", procedure_any(&["wrist", "hand"]), "WRIST"),
        procedure_rule("elbow", procedure_has("elbow"), "ELBOW"),
    ]
}

/// Long-bone procedures look at the scenario first: tumor, then infarct,
/// then infection, then the nearest joint.
fn extremity_rules() -> Vec<Rule> {
    let context_rule = |id: &str, context: &[&str], protocol: &str| {
        Rule::new(
            id,
            RuleGroup::ProcedureContext,
            all(vec![procedure_any(&EXTREMITY_BONE), scenario_any(context)]),
            protocol,
            MatchTier::ProcedureContext,
        )
    };

    vec![
        context_rule("extremity-tumor", &BONE_TUMOR_CONTEXT, "BONE TUMOR"),
        context_rule("extremity-infarct", &BONE_INFARCT_CONTEXT, "OSTEONECROSIS"),
        context_rule("extremity-infection", &BONE_INFECTION_CONTEXT, "OSTEOMYELITIS"),
        procedure_rule(
            "extremity-thigh",
            procedure_any(&["thigh", "femur", "lower extremity"]),
            "HIP",
        ),
        procedure_rule(
            "extremity-lower-leg",
            procedure_any(&["lower leg", "tibia", "fibula"]),
            "KNEE",
        ),
        procedure_rule("extremity-forearm", procedure_has("forearm"), "ELBOW"),
        procedure_rule(
            "extremity-upper-arm",
            procedure_any(&["upper arm", "humerus", "upper extremity"]),
            "SHOULDER",
        ),
    ]
}

/// Anatomy the main table does not name. Listed after the spine levels:
/// a lumbar spine study that also covers the sacrum is still a spine study.
fn supplementary_rules() -> Vec<Rule> {
    let sacrum = all(vec![
        procedure_has("sacrum"),
        not(procedure_has("sacroiliac")),
    ]);

    vec![
        procedure_rule("sacroiliac", procedure_has("sacroiliac"), "SI JOINTS"),
        procedure_rule("whole-body", procedure_has("whole body"), "WHOLE BODY"),
        procedure_rule(
            "maxillofacial",
            procedure_any(&["maxillofacial", "facial"]),
            "MAXILLOFACIAL",
        ),
        procedure_rule("sinuses", procedure_any(&["sinus", "paranasal"]), "SINUSES"),
        Rule::new(
            "sacrum-infection",
            RuleGroup::Spine,
            all(vec![sacrum.clone(), scenario_any(&SACRAL_INFECTION_CONTEXT)]),
            "SPINE INFECTION",
            MatchTier::ProcedureContext,
        ),
        Rule::new("sacrum", RuleGroup::Spine, sacrum, "L-SPINE", MatchTier::Procedure),
    ]
}

/// Spine levels. The infection override is always listed before the plain
/// level rule it refines, and multi-level before single level.
fn spine_rules() -> Vec<Rule> {
    let infection = any(vec![
        scenario_any(&SPINE_INFECTION_CONTEXT),
        procedure_any(&SPINE_INFECTION_CONTEXT),
    ]);
    let multi_level = all(vec![
        procedure_has("spine"),
        any(vec![
            procedure_any(&["complete", "total"]),
            all(vec![procedure_has("cervical"), procedure_has("lumbar")]),
        ]),
    ]);

    let mut rules = Vec::new();
    let mut push_level = |id: &str, level: Condition, protocol: &str| {
        rules.push(Rule::new(
            &format!("{}-infection", id),
            RuleGroup::Spine,
            all(vec![level.clone(), infection.clone()]),
            "SPINE INFECTION",
            MatchTier::ProcedureContext,
        ));
        rules.push(Rule::new(
            id,
            RuleGroup::Spine,
            level,
            protocol,
            MatchTier::Procedure,
        ));
    };

    push_level("screening-spine", multi_level, "SCREENING SPINE");
    push_level(
        "c-spine",
        all(vec![procedure_has("cervical"), procedure_has("spine")]),
        "C-SPINE",
    );
    push_level(
        "t-spine",
        all(vec![procedure_has("thoracic"), procedure_has("spine")]),
        "T-SPINE",
    );
    push_level(
        "l-spine",
        all(vec![procedure_has("lumbar"), procedure_has("spine")]),
        "L-SPINE",
    );

    rules
}

/// Tier 2: only reached when no procedure rule fired. Region scope comes
/// from the declared region or from anatomy left in the procedure name.
fn scenario_rules() -> Result<Vec<Rule>> {
    let neuro = any(vec![procedure_any(&NEURO_PROCEDURE), region_is(Region::Neuro)]);
    let msk = any(vec![procedure_any(&MSK_PROCEDURE), region_is(Region::Msk)]);
    let spine = any(vec![procedure_any(&SPINE_PROCEDURE), region_is(Region::Spine)]);

    let scoped = |id: &str, scope: &Condition, condition: Condition, protocol: &str| {
        Rule::new(
            id,
            RuleGroup::ScenarioOnly,
            all(vec![scope.clone(), condition]),
            protocol,
            MatchTier::Scenario,
        )
    };

    Ok(vec![
        scoped(
            "neuro-acute-stroke",
            &neuro,
            all(vec![
                scenario_any(&["stroke", "ischemic"]),
                scenario_any(&["acute"]),
            ]),
            "BRAIN",
        ),
        scoped(
            "neuro-tia",
            &neuro,
            any(vec![
                scenario_word("tia")?,
                scenario_any(&["transient ischemic"]),
            ]),
            "TIA",
        ),
        scoped(
            "neuro-tumor",
            &neuro,
            scenario_any(&["tumor", "mass", "lesion", "metasta"]),
            "BRAIN TUMOR/INF",
        ),
        scoped(
            "neuro-seizure",
            &neuro,
            scenario_any(&["seizure", "epilep"]),
            "SEIZURE",
        ),
        scoped(
            "neuro-ms",
            &neuro,
            scenario_any(&["multiple sclerosis", " ms ", "demyelinat"]),
            "BRAIN MS",
        ),
        scoped(
            "neuro-pituitary",
            &neuro,
            scenario_any(&["pituitary", "sellar"]),
            "PITUITARY",
        ),
        scoped(
            "msk-infection",
            &msk,
            scenario_any(&[
                "osteomyelitis",
                "septic arthritis",
                "soft tissue infection",
                "cellulitis",
                "abscess",
            ]),
            "OSTEOMYELITIS",
        ),
        scoped(
            "msk-infection-generic",
            &msk,
            all(vec![
                scenario_any(&["infection"]),
                not(scenario_any(&["brain", "discitis"])),
            ]),
            "OSTEOMYELITIS",
        ),
        scoped(
            "spine-infection",
            &spine,
            scenario_any(&[
                "spine infection",
                "discitis",
                "epidural abscess",
                "spondylodiscitis",
            ]),
            "SPINE INFECTION",
        ),
        Rule::new(
            "spine-fallback",
            RuleGroup::ScenarioOnly,
            all(vec![spine, procedure_has("spine")]),
            "L-SPINE",
            MatchTier::Fallback,
        ),
    ])
}
