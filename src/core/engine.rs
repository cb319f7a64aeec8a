use crate::domain::ports::AuditPipeline;
use crate::utils::error::Result;
use crate::utils::monitor::RunMonitor;

pub struct AuditEngine<P: AuditPipeline> {
    pipeline: P,
    monitor: RunMonitor,
}

impl<P: AuditPipeline> AuditEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            monitor: RunMonitor::disabled(),
        }
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: RunMonitor::new(monitor_enabled),
        }
    }

    pub fn monitor(&self) -> &RunMonitor {
        &self.monitor
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting routing audit");

        // Extract
        let catalog = self.pipeline.extract().await?;
        self.monitor.mark_phase("extract");

        // Transform
        let report = self.pipeline.transform(catalog).await?;
        self.monitor.mark_phase("transform");

        // Load
        let output_path = self.pipeline.load(report).await?;
        self.monitor.mark_phase("load");

        tracing::info!("✅ Audit report saved to: {}", output_path);
        self.monitor.log_summary();
        Ok(output_path)
    }
}
