use clap::Parser;
use forecast_hitos::config::toml_config::TomlConfig;
use forecast_hitos::core::ConfigProvider;
use forecast_hitos::utils::error::ErrorSeverity;
use forecast_hitos::utils::{logger, validation::Validate};
use forecast_hitos::{ForecastEngine, LocalStorage, MilestonePipeline};

#[derive(Parser)]
#[command(name = "toml-forecast")]
#[command(about = "Milestone revenue forecast driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "forecast.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override strict date handling from config
    #[arg(long)]
    strict_dates: Option<bool>,

    /// Dry run - show what would be processed without executing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    tracing::info!("🚀 Starting TOML-based forecast tool");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 應用命令列覆蓋設定
    if let Some(strict) = args.strict_dates {
        config.amortize.strict_dates = Some(strict);
        tracing::info!("🔧 Strict dates overridden to: {}", strict);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");

    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        perform_dry_run(&config);
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = MilestonePipeline::new(storage, config);
    let engine = ForecastEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(summary) => {
            let unbalanced = summary.result.audit.unbalanced().count();
            tracing::info!("✅ Forecast completed successfully!");
            println!("✅ Forecast completed successfully!");
            println!(
                "📋 {} projects audited, {} need review, {} rows rejected",
                summary.result.audit.entries.len(),
                unbalanced,
                summary.result.rejections.len()
            );
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
        "  Pipeline: {} v{}",
        config.pipeline.name,
        config.pipeline.version.as_deref().unwrap_or("0.0.0")
    );
    println!("  Source: {}", config.input_path());
    println!("  Output: {}", config.output_path());
    println!("  Formats: {}", config.load.output_formats.join(", "));
    println!("  Scale mode: {}", config.scale_mode());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &TomlConfig) {
    println!("🔍 Dry Run Analysis:");
    println!();

    println!("📄 Data Source Analysis:");
    println!("  File: {}", config.input_path());
    println!("  Sheet: {}", config.sheet().unwrap_or("(first sheet)"));

    println!();
    println!("⚙️ Processing Mode:");
    println!("  Percent scale: {}", config.scale_mode());
    println!("  Audit tolerance: ±{}%", config.audit_tolerance());
    if config.strict_dates() {
        println!("  📅 Strict dates: any bad date range aborts the run");
    } else {
        println!("  📅 Rows with bad date ranges are skipped and reported");
    }
    println!("  Totals row label: {}", config.totals_label());

    println!();
    println!("💾 Output Configuration:");
    println!("  Path: {}", config.output_path());
    for format in config.output_formats() {
        println!("  {} -> {}", format, config.file_name(format));
    }
    if let Some(bundle) = config.bundle_name() {
        println!("  Compression: {} (ZIP)", bundle);
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}
