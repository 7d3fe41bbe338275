use clap::Parser;
use forecast_hitos::adapters::report_writer::format_amount;
use forecast_hitos::utils::error::ErrorSeverity;
use forecast_hitos::utils::{logger, validation::Validate};
use forecast_hitos::{CliConfig, ForecastEngine, LocalStorage, MilestonePipeline, RunSummary};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting forecast-hitos CLI");
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
        tracing::info!("🔍 System monitoring enabled");
    }

    let totals_label = config.totals_label.clone();
    let storage = LocalStorage::new(config.output_path.clone());
    let pipeline = MilestonePipeline::new(storage, config);
    let engine = ForecastEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(summary) => {
            print_summary(&summary, &totals_label);
            tracing::info!("✅ Forecast completed successfully!");
            println!("✅ Forecast completed successfully!");
            println!("📁 Output saved to: {}", summary.output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Forecast failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
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

fn print_summary(summary: &RunSummary, totals_label: &str) {
    let result = &summary.result;

    println!("📋 Auditoría de porcentajes:");
    for entry in &result.audit.entries {
        let mark = if entry.is_balanced() { "✅" } else { "🚨" };
        println!(
            "  {} {}: {}% ({} hitos)",
            mark, entry.project, entry.percent_total, entry.milestones
        );
    }

    if !result.rejections.is_empty() {
        println!();
        println!("⚠️ Filas descartadas:");
        for rejection in &result.rejections {
            println!(
                "  fila {} ({} / {}): {}",
                rejection.row, rejection.project, rejection.milestone, rejection.reason
            );
        }
    }

    let totals = &result.matrix.totals;
    println!();
    println!("📊 {}:", totals_label);
    for month in &result.matrix.months {
        let amount = totals.monthly_amounts.get(month).copied().unwrap_or_default();
        println!("  {}: {}", month, format_amount(amount));
    }
    println!("  Total hitos: {}", format_amount(totals.milestone_amount));
    println!();
}
