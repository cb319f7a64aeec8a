use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// 影像檢查方式。未知字串一律視為 `Other`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum Modality {
    #[serde(rename = "MRI")]
    Mri,
    #[serde(rename = "CT")]
    Ct,
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "XR")]
    Xr,
    #[serde(rename = "PET")]
    Pet,
    #[serde(rename = "NM")]
    Nm,
    Mammo,
    Fluoro,
    #[default]
    Other,
}

impl Modality {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "mri" | "mr" | "mra" | "mrv" => Modality::Mri,
            "ct" => Modality::Ct,
            "us" | "ultrasound" => Modality::Us,
            "xr" | "x-ray" | "xray" | "radiography" => Modality::Xr,
            "pet" | "pet/ct" | "pet/mri" => Modality::Pet,
            "nm" | "nuclear medicine" => Modality::Nm,
            "mammo" | "mammography" => Modality::Mammo,
            "fluoro" | "fluoroscopy" => Modality::Fluoro,
            _ => Modality::Other,
        }
    }
}

impl<'de> Deserialize<'de> for Modality {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Modality::parse).unwrap_or_default())
    }
}

/// 八個解剖目錄之一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Neuro,
    Spine,
    Msk,
    Abdomen,
    Chest,
    Vascular,
    Breast,
    Peds,
}

impl Region {
    pub const ALL: [Region; 8] = [
        Region::Neuro,
        Region::Spine,
        Region::Chest,
        Region::Abdomen,
        Region::Msk,
        Region::Vascular,
        Region::Breast,
        Region::Peds,
    ];

    /// Unknown text is not an error, it just means "no declared region".
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "neuro" => Some(Region::Neuro),
            "spine" => Some(Region::Spine),
            "msk" => Some(Region::Msk),
            "abdomen" => Some(Region::Abdomen),
            "chest" => Some(Region::Chest),
            "vascular" => Some(Region::Vascular),
            "breast" => Some(Region::Breast),
            "peds" => Some(Region::Peds),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Neuro => "neuro",
            Region::Spine => "spine",
            Region::Msk => "msk",
            Region::Abdomen => "abdomen",
            Region::Chest => "chest",
            Region::Vascular => "vascular",
            Region::Breast => "breast",
            Region::Peds => "peds",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub modality: Modality,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub rating: u8,
    #[serde(
        default,
        rename = "usesContrast",
        alias = "uses_contrast",
        deserialize_with = "contrast_flag"
    )]
    pub uses_contrast: bool,
}

const CONTRAST_PHRASES: [&str; 4] = ["with iv contrast", "with and without", "w/ contrast", "w/wo"];

impl Procedure {
    /// MRI modality, or an MRI-looking name on a mislabelled record.
    pub fn is_mri_like(&self) -> bool {
        if self.modality == Modality::Mri {
            return true;
        }
        let upper = self.name.to_uppercase();
        upper.contains("MRI") || upper.contains("MR ")
    }

    pub fn needs_contrast(&self) -> bool {
        if self.uses_contrast {
            return true;
        }
        let lower = self.name.to_lowercase();
        CONTRAST_PHRASES.iter().any(|phrase| lower.contains(phrase))
    }
}

/// 目錄裡的 usesContrast 可能是布林或 0/1/2
fn contrast_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(flag)) => flag,
        Some(serde_json::Value::Number(n)) => matches!(n.as_i64(), Some(1) | Some(2)),
        _ => false,
    })
}

/// 評分缺漏或格式不對時當作 0，交給評分門檻過濾
fn lenient_rating<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|v| u8::try_from(v).ok())
            .unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// Scenario ids appear as both numbers and strings in the catalogs.
pub(crate) fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default, deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub region: Region,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMatch {
    #[serde(deserialize_with = "id_string")]
    pub scenario_id: String,
    #[serde(default)]
    pub relevance_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    pub name: String,
    #[serde(default)]
    pub body_region: String,
    #[serde(default)]
    pub body_part: String,
    #[serde(default)]
    pub sequences: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "contrast_flag")]
    pub uses_contrast: bool,
    #[serde(default)]
    pub scenario_matches: Vec<ScenarioMatch>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub protocols: Vec<Protocol>,
    pub scenarios: Vec<Scenario>,
}

/// 路由決策所在的層級
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchTier {
    #[serde(rename = "procedure")]
    Procedure,
    #[serde(rename = "procedure+context")]
    ProcedureContext,
    #[serde(rename = "scenario")]
    Scenario,
    #[serde(rename = "fallback")]
    Fallback,
    #[serde(rename = "none")]
    None,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Procedure => "procedure",
            MatchTier::ProcedureContext => "procedure+context",
            MatchTier::Scenario => "scenario",
            MatchTier::Fallback => "fallback",
            MatchTier::None => "none",
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one cascade evaluation.
///
/// Fields are private: the only constructors keep `match_tier == None`
/// exactly when no protocol is named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    protocol_name: Option<String>,
    match_tier: MatchTier,
    rule: Option<String>,
}

impl RoutingDecision {
    /// `tier` must not be `MatchTier::None`; a `None` tier is coerced to
    /// `Procedure` rather than producing an inconsistent decision.
    pub fn routed(protocol: impl Into<String>, tier: MatchTier, rule: impl Into<String>) -> Self {
        let match_tier = match tier {
            MatchTier::None => MatchTier::Procedure,
            other => other,
        };
        Self {
            protocol_name: Some(protocol.into()),
            match_tier,
            rule: Some(rule.into()),
        }
    }

    pub fn unrouted() -> Self {
        Self {
            protocol_name: None,
            match_tier: MatchTier::None,
            rule: None,
        }
    }

    pub fn protocol_name(&self) -> Option<&str> {
        self.protocol_name.as_deref()
    }

    pub fn match_tier(&self) -> MatchTier {
        self.match_tier
    }

    pub fn rule(&self) -> Option<&str> {
        self.rule.as_deref()
    }

    pub fn is_routed(&self) -> bool {
        self.protocol_name.is_some()
    }
}

/// Validator verdict for one (procedure, protocol) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub consistent: bool,
    pub concerns: Vec<String>,
}

impl Validation {
    pub fn consistent() -> Self {
        Self {
            consistent: true,
            concerns: Vec::new(),
        }
    }
}
