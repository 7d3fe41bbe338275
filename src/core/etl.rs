use crate::core::{ForecastResult, Pipeline};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// Outcome of one run: where the output went, plus the computed result for reporting.
#[derive(Debug)]
pub struct RunSummary {
    pub output_path: String,
    pub result: ForecastResult,
}

pub struct ForecastEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> ForecastEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<RunSummary> {
        tracing::info!("Starting forecast run...");

        // Extract
        tracing::info!("📥 Extracting milestones...");
        let table = self.pipeline.extract().await?;
        tracing::info!("Extracted {} rows", table.records.len());
        self.monitor.log_stats("Extract");

        // Transform
        tracing::info!("🧮 Normalizing, auditing and amortizing...");
        let result = self.pipeline.transform(table).await?;
        tracing::info!(
            "Projected {} milestones over {} months",
            result.matrix.rows.len(),
            result.matrix.months.len()
        );
        for entry in result.audit.unbalanced() {
            tracing::warn!(
                "🚨 Unbalanced project '{}': {}% (expected 100%)",
                entry.project,
                entry.percent_total
            );
        }
        self.monitor.log_stats("Transform");

        // Load
        tracing::info!("💾 Writing reports...");
        let output_path = self.pipeline.load(&result).await?;
        tracing::info!("Output saved to: {}", output_path);
        self.monitor.log_stats("Load");

        if self.monitor.is_enabled() {
            self.monitor.log_final_stats();
        }

        Ok(RunSummary {
            output_path,
            result,
        })
    }
}
