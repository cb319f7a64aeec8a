pub mod cli;
pub mod toml_config;

use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};

pub const OUTPUT_FORMATS: [&str; 2] = ["json", "csv"];

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "protocol-router")]
#[command(about = "Audit lexical routing of imaging procedures to MRI protocols")]
pub struct CliConfig {
    #[arg(long, default_value = "./catalog")]
    pub catalog_dir: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, default_value = "5", help = "Lowest appropriateness rating to audit (1-9)")]
    pub min_rating: u8,

    #[arg(long, default_value = "20", help = "Examples kept per report section")]
    pub example_limit: usize,

    #[arg(long, default_value = "4")]
    pub concurrency: usize,

    #[arg(long, value_delimiter = ',', default_value = "json,csv")]
    pub formats: Vec<String>,

    #[arg(long, help = "Bundle report files into audit_report.zip")]
    pub bundle: bool,

    #[arg(long, help = "Audit every modality, not only MRI/MRA")]
    pub all_modalities: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log phase timings and memory usage")]
    pub monitor: bool,
}

impl ConfigProvider for CliConfig {
    fn catalog_dir(&self) -> &str {
        &self.catalog_dir
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn min_rating(&self) -> u8 {
        self.min_rating
    }

    fn example_limit(&self) -> usize {
        self.example_limit
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

    fn mri_only(&self) -> bool {
        !self.all_modalities
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("catalog_dir", &self.catalog_dir)?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_range("min_rating", self.min_rating, 1, 9)?;
        validation::validate_positive_number("concurrency", self.concurrency, 1)?;
        validation::validate_formats("formats", &self.formats, &OUTPUT_FORMATS)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let config = CliConfig::parse_from(["protocol-router"]);
        assert_eq!(config.catalog_dir, "./catalog");
        assert_eq!(config.min_rating, 5);
        assert_eq!(config.example_limit, 20);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.output_formats(), vec!["json", "csv"]);
        assert!(config.mri_only());
        assert!(!config.bundle_output());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides() {
        let config = CliConfig::parse_from([
            "protocol-router",
            "--catalog-dir",
            "/data/acr",
            "--min-rating",
            "7",
            "--formats",
            "json",
            "--bundle",
            "--all-modalities",
        ]);
        assert_eq!(config.catalog_dir(), "/data/acr");
        assert_eq!(config.min_rating(), 7);
        assert_eq!(config.output_formats(), vec!["json"]);
        assert!(config.bundle_output());
        assert!(!config.mri_only());
    }

    #[test]
    fn test_cli_validation_rejects_bad_values() {
        let mut config = CliConfig::parse_from(["protocol-router"]);
        config.min_rating = 0;
        assert!(config.validate().is_err());

        let mut config = CliConfig::parse_from(["protocol-router"]);
        config.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = CliConfig::parse_from(["protocol-router"]);
        config.formats = vec!["xml".to_string()];
        assert!(config.validate().is_err());
    }
}
