pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli_args::CliConfig;

#[cfg(feature = "cli")]
mod cli_args {
    use crate::core::amortization::DEFAULT_TOTALS_LABEL;
    use crate::core::normalizer::ScaleMode;
    use crate::core::ConfigProvider;
    use crate::utils::error::Result;
    use crate::utils::validation::{self, Validate, INPUT_EXTENSIONS};
    use clap::Parser;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, Parser)]
    #[command(name = "forecast-hitos")]
    #[command(about = "Monthly revenue/cost projection from project milestones")]
    pub struct CliConfig {
        #[arg(short, long, help = "Milestone spreadsheet (.xlsx, .xls, .ods or .csv)")]
        pub input: String,

        #[arg(long, help = "Sheet to read (defaults to the first one)")]
        pub sheet: Option<String>,

        #[arg(long, default_value = "./output")]
        pub output_path: String,

        #[arg(long, value_delimiter = ',', default_value = "xlsx,json")]
        pub output_formats: Vec<String>,

        #[arg(long, value_enum, default_value_t = ScaleMode::PerValue)]
        pub scale_mode: ScaleMode,

        #[arg(long, default_value_t = 1.0, help = "Audit tolerance in percentage points")]
        pub tolerance: f64,

        #[arg(long, help = "Fail the whole run on the first invalid date range")]
        pub strict_dates: bool,

        #[arg(long, default_value = DEFAULT_TOTALS_LABEL)]
        pub totals_label: String,

        #[arg(long, help = "Bundle every output into this ZIP file")]
        pub zip: Option<String>,

        #[arg(short, long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Emit logs as JSON lines")]
        pub json_logs: bool,

        #[arg(long, help = "Log CPU and memory usage per phase")]
        pub monitor: bool,
    }

    impl ConfigProvider for CliConfig {
        fn input_path(&self) -> &str {
            &self.input
        }

        fn sheet(&self) -> Option<&str> {
            self.sheet.as_deref()
        }

        fn output_path(&self) -> &str {
            &self.output_path
        }

        fn output_formats(&self) -> &[String] {
            &self.output_formats
        }

        fn scale_mode(&self) -> ScaleMode {
            self.scale_mode
        }

        fn audit_tolerance(&self) -> f64 {
            self.tolerance
        }

        fn strict_dates(&self) -> bool {
            self.strict_dates
        }

        fn totals_label(&self) -> &str {
            &self.totals_label
        }

        fn bundle_name(&self) -> Option<&str> {
            self.zip.as_deref()
        }
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            validation::validate_path("input", &self.input)?;
            validation::validate_file_extension("input", &self.input, &INPUT_EXTENSIONS)?;
            validation::validate_path("output_path", &self.output_path)?;
            validation::validate_output_formats("output_formats", &self.output_formats)?;
            validation::validate_range("tolerance", self.tolerance, 0.0, 100.0)?;
            validation::validate_non_empty_string("totals_label", &self.totals_label)?;
            if let Some(zip) = &self.zip {
                validation::validate_file_extension("zip", zip, &["zip"])?;
            }
            Ok(())
        }
    }

}
