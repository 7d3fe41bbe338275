use thiserror::Error;

/// 欄位名稱，依輸入檔案的表頭順序
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "Proyecto",
    "Total Proyecto",
    "Hito",
    "% del Proyecto",
    "Fecha Inicio",
    "Fecha Fin",
];

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error(
        "Missing columns {missing:?}. Make sure the file has: {}",
        REQUIRED_COLUMNS.join(", ")
    )]
    SchemaError { missing: Vec<String> },

    #[error("Row {row}: cannot parse '{column}' value '{raw}'")]
    ValueParseError {
        row: usize,
        column: String,
        raw: String,
    },

    #[error("Row {row} ({milestone}): {reason}")]
    DateRangeError {
        row: usize,
        milestone: String,
        reason: String,
    },

    #[error("Computation failed: {message}")]
    ComputationError { message: String },

    #[error("Spreadsheet read failed: {0}")]
    SpreadsheetError(#[from] calamine::Error),

    #[error("Workbook write failed: {0}")]
    WorkbookError(#[from] rust_xlsxwriter::XlsxError),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration '{field}'")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Data,
    Computation,
    Output,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ForecastError {
    pub fn schema(missing: Vec<String>) -> Self {
        Self::SchemaError { missing }
    }

    pub fn value_parse(row: usize, column: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::ValueParseError {
            row,
            column: column.into(),
            raw: raw.into(),
        }
    }

    pub fn date_range(row: usize, milestone: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DateRangeError {
            row,
            milestone: milestone.into(),
            reason: reason.into(),
        }
    }

    pub fn computation(message: impl Into<String>) -> Self {
        Self::ComputationError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SchemaError { .. } | Self::SpreadsheetError(_) | Self::CsvError(_) => {
                ErrorCategory::Input
            }
            Self::ValueParseError { .. } | Self::DateRangeError { .. } => ErrorCategory::Data,
            Self::ComputationError { .. } => ErrorCategory::Computation,
            Self::WorkbookError(_) | Self::ZipError(_) | Self::SerializationError(_) => {
                ErrorCategory::Output
            }
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 可回復：數值以 0 取代後繼續
            Self::ValueParseError { .. } => ErrorSeverity::Low,
            Self::DateRangeError { .. } => ErrorSeverity::Medium,
            Self::IoError(_) | Self::ComputationError { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::SchemaError { .. } => format!(
                "Add the missing columns to the first sheet: {}",
                REQUIRED_COLUMNS.join(", ")
            ),
            Self::ValueParseError { column, .. } => {
                format!("Write '{}' as a plain number (e.g. 20 or 0.2)", column)
            }
            Self::DateRangeError { .. } => {
                "Check that 'Fecha Fin' is on or after 'Fecha Inicio' and both are valid dates"
                    .to_string()
            }
            Self::ComputationError { .. } => {
                "Check 'Total Proyecto' for out-of-range amounts".to_string()
            }
            Self::SpreadsheetError(_) => {
                "Make sure the input is a valid .xlsx, .xls, .ods or .csv file".to_string()
            }
            Self::CsvError(_) => "Check the CSV delimiter and quoting".to_string(),
            Self::WorkbookError(_) | Self::ZipError(_) | Self::SerializationError(_) => {
                "Check the output directory and retry".to_string()
            }
            Self::IoError(_) => "Check that the paths exist and are writable".to_string(),
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => {
                "Review the command line flags or the TOML configuration file".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::SchemaError { .. } => format!(
                "Faltan columnas. Asegúrate de tener: {}",
                REQUIRED_COLUMNS.join(", ")
            ),
            Self::DateRangeError { .. } => format!("Fechas inválidas: {}", self),
            _ => format!("Error procesando el archivo: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
