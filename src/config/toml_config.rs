use crate::config::OUTPUT_FORMATS;
use crate::core::ConfigProvider;
use crate::utils::error::{Result, RouterError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub audit: AuditConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    pub report: ReportConfig,
    pub performance: Option<PerformanceConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub dir: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    pub min_rating: Option<u8>,
    pub mri_only: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub output_path: String,
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    pub example_limit: Option<usize>,
    pub compression: Option<CompressionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn default_formats() -> Vec<String> {
    OUTPUT_FORMATS.iter().map(|f| f.to_string()).collect()
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RouterError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RouterError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CATALOG_DIR})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| RouterError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("audit.name", &self.audit.name)?;
        validation::validate_path("catalog.dir", &self.catalog.dir)?;
        validation::validate_path("report.output_path", &self.report.output_path)?;
        validation::validate_formats("report.formats", &self.report.formats, &OUTPUT_FORMATS)?;

        if let Some(min_rating) = self.filter.min_rating {
            validation::validate_range("filter.min_rating", min_rating, 1, 9)?;
        }

        if let Some(concurrency) = self.performance.as_ref().and_then(|p| p.concurrency) {
            validation::validate_positive_number("performance.concurrency", concurrency, 1)?;
        }

        if let Some(level) = self.log_level() {
            if !LOG_LEVELS.contains(&level) {
                return Err(RouterError::InvalidConfigValueError {
                    field: "monitoring.log_level".to_string(),
                    value: level.to_string(),
                    reason: format!("must be one of: {}", LOG_LEVELS.join(", ")),
                });
            }
        }

        Ok(())
    }

    pub fn compression_enabled(&self) -> bool {
        self.report
            .compression
            .as_ref()
            .map(|c| c.enabled)
            .unwrap_or(false)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    /// `[monitoring] log_level`，交給 logger 當預設過濾等級
    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }
}

impl ConfigProvider for TomlConfig {
    fn catalog_dir(&self) -> &str {
        &self.catalog.dir
    }

    fn output_path(&self) -> &str {
        &self.report.output_path
    }

    fn min_rating(&self) -> u8 {
        self.filter.min_rating.unwrap_or(5)
    }

    fn example_limit(&self) -> usize {
        self.report.example_limit.unwrap_or(20)
    }

    fn concurrency(&self) -> usize {
        self.performance
            .as_ref()
            .and_then(|p| p.concurrency)
            .unwrap_or(4)
    }

    fn output_formats(&self) -> Vec<String> {
        self.report.formats.clone()
    }

    fn bundle_output(&self) -> bool {
        self.compression_enabled()
    }

    fn mri_only(&self) -> bool {
        self.filter.mri_only.unwrap_or(true)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
