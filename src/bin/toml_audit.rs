use clap::Parser;
use protocol_router::app::catalog::{region_file, PROTOCOLS_FILE};
use protocol_router::core::{ConfigProvider, Storage};
use protocol_router::domain::model::Region;
use protocol_router::utils::error::ErrorSeverity;
use protocol_router::utils::logger::{self, LogFormat};
use protocol_router::utils::validation::Validate;
use protocol_router::{AuditEngine, LocalStorage, Router, RoutingAuditPipeline, TomlConfig};

#[derive(Parser)]
#[command(name = "toml-audit")]
#[command(about = "Routing audit driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "audit-config.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON log lines instead of the compact format
    #[arg(long)]
    json_logs: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the rating floor from config
    #[arg(long)]
    min_rating: Option<u8>,

    /// Show what would be audited without writing a report
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 設定檔先讀，logger 的等級來自 [monitoring]
    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    logger::init_logger(
        LogFormat::from_flag(args.json_logs),
        &logger::filter_directive(config.log_level(), args.verbose),
    );
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    if let Some(min_rating) = args.min_rating {
        config.filter.min_rating = Some(min_rating);
        tracing::info!("🔧 Rating floor overridden to: {}", min_rating);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    display_config_summary(&config, &args);

    if args.dry_run {
        perform_dry_run(&config).await?;
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());

    let catalog_storage = LocalStorage::new(config.catalog_dir().to_string());
    let output_storage = LocalStorage::new(config.output_path().to_string());

    let result = match RoutingAuditPipeline::new(catalog_storage, output_storage, config) {
        Ok(pipeline) => {
            AuditEngine::new_with_monitoring(pipeline, monitor_enabled)
                .run()
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(output_path) => {
            println!("✅ Routing audit completed");
            println!("📁 Report saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Audit failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!(
        "  Audit: {} v{}",
        config.audit.name,
        config.audit.version.as_deref().unwrap_or("-")
    );
    println!("  Catalog: {}", config.catalog_dir());
    println!("  Output: {}", config.output_path());
    println!("  Formats: {}", config.output_formats().join(", "));
    println!(
        "  Filter: rating >= {}, MRI only: {}",
        config.min_rating(),
        config.mri_only()
    );
    println!("  Workers: {}", config.concurrency());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

async fn perform_dry_run(config: &TomlConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Dry Run Analysis:");
    println!();

    let storage = LocalStorage::new(config.catalog_dir().to_string());

    println!("📂 Catalog Files:");
    let mark = |found: bool| if found { "✅" } else { "❌" };
    println!("  {} {}", mark(storage.exists(PROTOCOLS_FILE).await), PROTOCOLS_FILE);
    for region in Region::ALL {
        let path = region_file(region);
        println!("  {} {}", mark(storage.exists(&path).await), path);
    }

    let router = Router::standard()?;
    println!();
    println!("🔀 Rule Table:");
    println!("  Rules: {}", router.rules().len());
    println!("  Target protocols: {}", router.rules().protocol_names().len());

    println!();
    println!("💾 Output Configuration:");
    println!("  Path: {}", config.output_path());
    if config.bundle_output() {
        println!("  Compression: audit_report.zip");
    }

    println!();
    println!("✅ Dry run analysis complete.");
    Ok(())
}
