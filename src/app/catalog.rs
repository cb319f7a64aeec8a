use crate::domain::model::{Catalog, Procedure, Protocol, Region, Scenario};
use crate::domain::ports::Storage;
use crate::utils::error::{Result, RouterError};
use serde::Deserialize;

pub const PROTOCOLS_FILE: &str = "protocols.json";

pub fn region_file(region: Region) -> String {
    format!("regions/{}.json", region)
}

#[derive(Debug, Deserialize)]
struct RegionFile {
    #[serde(default)]
    scenarios: Vec<RawScenario>,
}

/// Region files do not repeat the region on each scenario.
#[derive(Debug, Deserialize)]
struct RawScenario {
    #[serde(default, deserialize_with = "crate::domain::model::id_string")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    procedures: Vec<Procedure>,
}

pub fn parse_protocols(source_name: &str, data: &[u8]) -> Result<Vec<Protocol>> {
    serde_json::from_slice(data).map_err(|e| RouterError::CatalogError {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}

pub fn parse_region(source_name: &str, region: Region, data: &[u8]) -> Result<Vec<Scenario>> {
    let file: RegionFile =
        serde_json::from_slice(data).map_err(|e| RouterError::CatalogError {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;

    Ok(file
        .scenarios
        .into_iter()
        .map(|raw| Scenario {
            id: raw.id,
            name: raw.name,
            region,
            procedures: raw.procedures,
        })
        .collect())
}

/// 從目錄讀取協定與八個區域的情境
pub struct CatalogLoader<'a, S: Storage> {
    storage: &'a S,
}

impl<'a, S: Storage> CatalogLoader<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    pub async fn load(&self) -> Result<Catalog> {
        let data = self.storage.read_file(PROTOCOLS_FILE).await.map_err(|e| {
            RouterError::CatalogError {
                source_name: PROTOCOLS_FILE.to_string(),
                message: e.to_string(),
            }
        })?;
        let protocols = parse_protocols(PROTOCOLS_FILE, &data)?;
        tracing::debug!("Loaded {} protocols", protocols.len());

        let mut scenarios = Vec::new();
        for region in Region::ALL {
            let path = region_file(region);
            if !self.storage.exists(&path).await {
                tracing::warn!("⚠️ Region file {} not found, skipping", path);
                continue;
            }
            let data = self.storage.read_file(&path).await?;
            let region_scenarios = parse_region(&path, region, &data)?;
            tracing::debug!("Loaded {} scenarios from {}", region_scenarios.len(), path);
            scenarios.extend(region_scenarios);
        }

        Ok(Catalog {
            protocols,
            scenarios,
        })
    }
}
