use crate::app::catalog::CatalogLoader;
use crate::core::audit::{
    audit_pairs, collect_pairs, AuditAggregate, AuditContext, AuditPair, AuditReport,
    AuditSettings, RoutingMapEntry,
};
use crate::core::router::Router;
use crate::core::validator::RoutingValidator;
use crate::domain::model::{Catalog, MatchTier};
use crate::domain::ports::{AuditPipeline, ConfigProvider, Storage};
use crate::utils::error::{Result, RouterError};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use zip::write::{FileOptions, ZipWriter};

pub const REPORT_JSON: &str = "audit_report.json";
pub const ROUTING_MAP_CSV: &str = "routing_map.csv";
pub const UNROUTED_CSV: &str = "unrouted.csv";
pub const REPORT_BUNDLE: &str = "audit_report.zip";

#[derive(Debug, Serialize)]
struct RoutingMapRow<'a> {
    procedure: &'a str,
    protocol: &'a str,
    match_tier: MatchTier,
}

/// 稽核管道：讀目錄 → 路由與驗證 → 輸出報告
pub struct RoutingAuditPipeline<S: Storage, C: ConfigProvider> {
    catalog_storage: S,
    output_storage: S,
    config: C,
    router: Router,
    validator: RoutingValidator,
}

impl<S: Storage, C: ConfigProvider> RoutingAuditPipeline<S, C> {
    pub fn new(catalog_storage: S, output_storage: S, config: C) -> Result<Self> {
        Ok(Self::with_rules(
            catalog_storage,
            output_storage,
            config,
            Router::standard()?,
            RoutingValidator::standard(),
        ))
    }

    pub fn with_rules(
        catalog_storage: S,
        output_storage: S,
        config: C,
        router: Router,
        validator: RoutingValidator,
    ) -> Self {
        Self {
            catalog_storage,
            output_storage,
            config,
            router,
            validator,
        }
    }

    fn settings(&self) -> AuditSettings {
        AuditSettings {
            min_rating: self.config.min_rating(),
            example_limit: self.config.example_limit(),
            mri_only: self.config.mri_only(),
        }
    }

    fn wants(&self, format: &str) -> bool {
        self.config.output_formats().iter().any(|f| f == format)
    }
}

/// Split `pairs` into at most `workers` contiguous chunks, classify each on
/// a blocking worker and merge the partial aggregates in chunk order.
pub async fn audit_concurrently(
    ctx: Arc<AuditContext>,
    pairs: Vec<AuditPair>,
    workers: usize,
    example_limit: usize,
) -> Result<AuditAggregate> {
    let workers = workers.max(1);
    if workers == 1 || pairs.len() < 2 {
        return Ok(audit_pairs(&ctx, &pairs, example_limit));
    }

    let chunk_size = pairs.len().div_ceil(workers);
    let pairs = Arc::new(pairs);
    let mut handles = Vec::with_capacity(workers);

    for start in (0..pairs.len()).step_by(chunk_size) {
        let end = (start + chunk_size).min(pairs.len());
        let ctx = Arc::clone(&ctx);
        let pairs = Arc::clone(&pairs);
        handles.push(tokio::task::spawn_blocking(move || {
            audit_pairs(&ctx, &pairs[start..end], example_limit)
        }));
    }

    let mut merged = AuditAggregate::new(example_limit);
    for handle in handles {
        let partial = handle.await.map_err(|e| RouterError::ProcessingError {
            message: format!("audit worker failed: {}", e),
        })?;
        merged = merged.merge(partial);
    }
    Ok(merged)
}

pub fn routing_map_csv(rows: &[(String, RoutingMapEntry)]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for (procedure, entry) in rows {
        writer.serialize(RoutingMapRow {
            procedure,
            protocol: &entry.protocol,
            match_tier: entry.match_tier,
        })?;
    }
    writer
        .into_inner()
        .map_err(|e| RouterError::IoError(e.into_error()))
}

pub fn unrouted_csv(report: &AuditReport) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in &report.unrouted_rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| RouterError::IoError(e.into_error()))
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> AuditPipeline for RoutingAuditPipeline<S, C> {
    type Report = AuditReport;

    async fn extract(&self) -> Result<Catalog> {
        tracing::info!("📂 Loading catalogs from: {}", self.config.catalog_dir());
        let catalog = CatalogLoader::new(&self.catalog_storage).load().await?;
        tracing::info!(
            "Loaded {} protocols and {} scenarios",
            catalog.protocols.len(),
            catalog.scenarios.len()
        );
        Ok(catalog)
    }

    async fn transform(&self, catalog: Catalog) -> Result<AuditReport> {
        let settings = self.settings();
        let ctx = Arc::new(AuditContext::new(
            self.router.clone(),
            self.validator.clone(),
            &catalog,
        ));

        let pairs = collect_pairs(&catalog, &settings);
        tracing::info!(
            "🔀 Routing {} pairs (min rating {}, {} workers)",
            pairs.len(),
            settings.min_rating,
            self.config.concurrency()
        );

        let aggregate = audit_concurrently(
            Arc::clone(&ctx),
            pairs,
            self.config.concurrency(),
            settings.example_limit,
        )
        .await?;
        let report = AuditReport::from_aggregate(&ctx, aggregate);

        tracing::info!(
            "Routed {}, not routed {}, missing protocol {}, mismatched {}",
            report.summary.routed,
            report.summary.not_routed,
            report.summary.missing_protocol,
            report.summary.mismatched
        );
        for name in &report.dangling_rule_targets {
            tracing::warn!("⚠️ Rule table references unknown protocol: {}", name);
        }
        Ok(report)
    }

    async fn load(&self, report: AuditReport) -> Result<String> {
        let mut files: Vec<(&str, Vec<u8>)> = Vec::new();

        if self.wants("json") {
            files.push((REPORT_JSON, serde_json::to_vec_pretty(&report)?));
        }
        if self.wants("csv") {
            files.push((ROUTING_MAP_CSV, routing_map_csv(&report.routing_rows)?));
            files.push((UNROUTED_CSV, unrouted_csv(&report)?));
        }

        if self.config.bundle_output() {
            let zip_data = {
                let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                for (name, data) in &files {
                    zip.start_file::<_, ()>(*name, FileOptions::default())?;
                    zip.write_all(data)?;
                }
                let cursor = zip.finish()?;
                cursor.into_inner()
            };

            tracing::debug!("Writing report bundle ({} bytes)", zip_data.len());
            self.output_storage.write_file(REPORT_BUNDLE, &zip_data).await?;
            return Ok(format!("{}/{}", self.config.output_path(), REPORT_BUNDLE));
        }

        for (name, data) in &files {
            tracing::debug!("Writing {} ({} bytes)", name, data.len());
            self.output_storage.write_file(name, data).await?;
        }

        let primary = files.first().map(|(name, _)| *name).unwrap_or(REPORT_JSON);
        Ok(format!("{}/{}", self.config.output_path(), primary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Modality, Procedure, Protocol, Region, Scenario};
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                RouterError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        async fn exists(&self, path: &str) -> bool {
            self.files.lock().await.contains_key(path)
        }
    }

    struct MockConfig {
        formats: Vec<String>,
        bundle: bool,
        concurrency: usize,
    }

    impl MockConfig {
        fn new() -> Self {
            Self {
                formats: vec!["json".to_string(), "csv".to_string()],
                bundle: false,
                concurrency: 1,
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn catalog_dir(&self) -> &str {
            "catalog"
        }

        fn output_path(&self) -> &str {
            "test_output"
        }

        fn min_rating(&self) -> u8 {
            5
        }

        fn example_limit(&self) -> usize {
            10
        }

        fn concurrency(&self) -> usize {
            self.concurrency
        }

        fn output_formats(&self) -> Vec<String> {
            self.formats.clone()
        }

        fn bundle_output(&self) -> bool {
            self.bundle
        }
    }

    fn mri(name: &str) -> Procedure {
        Procedure {
            name: name.to_string(),
            modality: Modality::Mri,
            rating: 8,
            uses_contrast: false,
        }
    }

    fn catalog() -> Catalog {
        let protocols = ["BRAIN", "KNEE", "HIP", "L-SPINE", "SPINE INFECTION", "OSTEOMYELITIS"]
            .iter()
            .map(|name| Protocol {
                name: name.to_string(),
                body_region: String::new(),
                body_part: String::new(),
                sequences: Vec::new(),
                uses_contrast: false,
                scenario_matches: Vec::new(),
            })
            .collect();

        let scenarios = (0..12)
            .map(|i| Scenario {
                id: format!("s{}", i),
                name: format!("Scenario {} with infection", i),
                region: if i % 2 == 0 { Region::Msk } else { Region::Spine },
                procedures: vec![
                    mri("MRI knee without IV contrast"),
                    mri("MRI lumbar spine"),
                    mri("MRI thigh"),
                    mri("MRA runoff"),
                ],
            })
            .collect();

        Catalog {
            protocols,
            scenarios,
        }
    }

    #[tokio::test]
    async fn test_transform_is_independent_of_concurrency() {
        let storage = MockStorage::default();
        let mut reports = Vec::new();
        for workers in [1, 2, 3, 5, 64] {
            let mut config = MockConfig::new();
            config.concurrency = workers;
            let pipeline = RoutingAuditPipeline::new(storage.clone(), storage.clone(), config).unwrap();
            reports.push(pipeline.transform(catalog()).await.unwrap());
        }
        for report in &reports[1..] {
            assert_eq!(report, &reports[0]);
        }
        assert_eq!(reports[0].summary.pairs, 48);
    }

    #[tokio::test]
    async fn test_load_writes_json_and_csv() {
        let storage = MockStorage::default();
        let pipeline =
            RoutingAuditPipeline::new(storage.clone(), storage.clone(), MockConfig::new()).unwrap();
        let report = pipeline.transform(catalog()).await.unwrap();
        let path = pipeline.load(report).await.unwrap();

        assert_eq!(path, "test_output/audit_report.json");
        let json = storage.get_file(REPORT_JSON).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["summary"]["pairs"], 48);
        // MRA runoff only routes in msk scenarios, via the generic infection rule
        assert_eq!(value["summary"]["not_routed"], 6);

        let csv_data = storage.get_file(UNROUTED_CSV).await.unwrap();
        let text = String::from_utf8(csv_data).unwrap();
        assert!(text.starts_with("region,scenario_id,scenario,procedure,rating"));
        assert_eq!(text.lines().count(), 7);

        let map = String::from_utf8(storage.get_file(ROUTING_MAP_CSV).await.unwrap()).unwrap();
        assert!(map.contains("MRI thigh,OSTEOMYELITIS,procedure+context"));
    }

    #[tokio::test]
    async fn test_load_bundles_zip() {
        let storage = MockStorage::default();
        let mut config = MockConfig::new();
        config.bundle = true;
        let pipeline = RoutingAuditPipeline::new(storage.clone(), storage.clone(), config).unwrap();
        let report = pipeline.transform(catalog()).await.unwrap();
        let path = pipeline.load(report).await.unwrap();

        assert_eq!(path, "test_output/audit_report.zip");
        let zip_bytes = storage.get_file(REPORT_BUNDLE).await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec![REPORT_JSON, ROUTING_MAP_CSV, UNROUTED_CSV]);
        assert!(storage.get_file(REPORT_JSON).await.is_none());
    }

    #[tokio::test]
    async fn test_json_only_output() {
        let storage = MockStorage::default();
        let mut config = MockConfig::new();
        config.formats = vec!["json".to_string()];
        let pipeline = RoutingAuditPipeline::new(storage.clone(), storage.clone(), config).unwrap();
        let report = pipeline.transform(catalog()).await.unwrap();
        pipeline.load(report).await.unwrap();

        assert!(storage.get_file(REPORT_JSON).await.is_some());
        assert!(storage.get_file(UNROUTED_CSV).await.is_none());
    }
}
