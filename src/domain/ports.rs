use crate::domain::model::Catalog;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn catalog_dir(&self) -> &str;
    fn output_path(&self) -> &str;
    fn min_rating(&self) -> u8;
    fn example_limit(&self) -> usize;
    fn concurrency(&self) -> usize;
    fn output_formats(&self) -> Vec<String>;
    fn bundle_output(&self) -> bool;

    fn mri_only(&self) -> bool {
        true
    }
}

/// 三段式稽核：讀目錄、跑路由、寫報告
#[async_trait]
pub trait AuditPipeline: Send + Sync {
    type Report: Send;

    async fn extract(&self) -> Result<Catalog>;
    async fn transform(&self, catalog: Catalog) -> Result<Self::Report>;
    async fn load(&self, report: Self::Report) -> Result<String>;
}
