use clap::Parser;
use protocol_router::utils::error::ErrorSeverity;
use protocol_router::utils::{logger, validation::Validate};
use protocol_router::{AuditEngine, CliConfig, LocalStorage, RoutingAuditPipeline};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting protocol-router audit");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 Phase monitoring enabled");
    }

    let catalog_storage = LocalStorage::new(config.catalog_dir.clone());
    let output_storage = LocalStorage::new(config.output_path.clone());

    let result = match RoutingAuditPipeline::new(catalog_storage, output_storage, config) {
        Ok(pipeline) => {
            let engine = AuditEngine::new_with_monitoring(pipeline, monitor_enabled);
            engine.run().await
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
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

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
