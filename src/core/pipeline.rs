use crate::adapters::{report_writer, table_reader};
use crate::core::forecast::{run_forecast, ForecastOptions};
use crate::core::{ConfigProvider, ForecastResult, Pipeline, RawTable, Storage};
use crate::utils::error::{ForecastError, Result};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// 讀取里程碑試算表、計算月度攤提並輸出報表
pub struct MilestonePipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
}

impl<S: Storage, C: ConfigProvider> MilestonePipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    fn options(&self) -> Result<ForecastOptions> {
        let tolerance = self.config.audit_tolerance();
        let tolerance_pct = Decimal::from_f64(tolerance).ok_or_else(|| {
            ForecastError::InvalidConfigValueError {
                field: "tolerance".to_string(),
                value: tolerance.to_string(),
                reason: "Tolerance must be a finite number".to_string(),
            }
        })?;

        Ok(ForecastOptions {
            scale_mode: self.config.scale_mode(),
            tolerance_pct,
            strict_dates: self.config.strict_dates(),
        })
    }

    fn render(&self, format: &str, result: &ForecastResult) -> Result<Vec<u8>> {
        match format {
            "xlsx" => report_writer::render_xlsx(result, self.config.totals_label()),
            "csv" => report_writer::render_csv(result, self.config.totals_label()),
            "json" => report_writer::render_audit_json(result),
            other => Err(ForecastError::InvalidConfigValueError {
                field: "output_formats".to_string(),
                value: other.to_string(),
                reason: "Unsupported format".to_string(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for MilestonePipeline<S, C> {
    async fn extract(&self) -> Result<RawTable> {
        let input = self.config.input_path();
        tracing::debug!("Reading input file: {}", input);

        let bytes = self.storage.read_file(input).await?;
        tracing::debug!("Read {} bytes", bytes.len());

        table_reader::read_table(&bytes, input, self.config.sheet())
    }

    async fn transform(&self, table: RawTable) -> Result<ForecastResult> {
        let options = self.options()?;
        tracing::debug!(
            "Scale mode: {}, tolerance: ±{}%, strict dates: {}",
            options.scale_mode,
            options.tolerance_pct,
            options.strict_dates
        );
        run_forecast(&table, &options)
    }

    async fn load(&self, result: &ForecastResult) -> Result<String> {
        let mut files = Vec::new();
        for format in self.config.output_formats() {
            let name = self.config.file_name(format);
            let data = self.render(format, result)?;
            tracing::debug!("Rendered {} ({} bytes)", name, data.len());
            files.push((name, data));
        }

        let output_dir = self.config.output_path().trim_end_matches('/');

        if let Some(bundle) = self.config.bundle_name() {
            tracing::debug!("Creating ZIP file with {} files", files.len());
            let zip_data = report_writer::bundle_zip(&files)?;
            self.storage.write_file(bundle, &zip_data).await?;
            return Ok(format!("{}/{}", output_dir, bundle));
        }

        for (name, data) in &files {
            self.storage.write_file(name, data).await?;
        }

        match files.as_slice() {
            [(name, _)] => Ok(format!("{}/{}", output_dir, name)),
            _ => Ok(output_dir.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::normalizer::ScaleMode;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn put_file(&self, path: &str, data: &[u8]) {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().await.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                ForecastError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.put_file(path, data).await;
            Ok(())
        }
    }

    struct MockConfig {
        input_path: String,
        output_formats: Vec<String>,
        bundle: Option<String>,
        strict_dates: bool,
    }

    impl MockConfig {
        fn new(formats: &[&str]) -> Self {
            Self {
                input_path: "hitos.csv".to_string(),
                output_formats: formats.iter().map(|f| f.to_string()).collect(),
                bundle: None,
                strict_dates: false,
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn input_path(&self) -> &str {
            &self.input_path
        }

        fn sheet(&self) -> Option<&str> {
            None
        }

        fn output_path(&self) -> &str {
            "test_output"
        }

        fn output_formats(&self) -> &[String] {
            &self.output_formats
        }

        fn scale_mode(&self) -> ScaleMode {
            ScaleMode::PerValue
        }

        fn audit_tolerance(&self) -> f64 {
            1.0
        }

        fn strict_dates(&self) -> bool {
            self.strict_dates
        }

        fn totals_label(&self) -> &str {
            "TOTAL MENSUAL"
        }

        fn bundle_name(&self) -> Option<&str> {
            self.bundle.as_deref()
        }
    }

    const SAMPLE_CSV: &str = "Proyecto,Total Proyecto,Hito,% del Proyecto,Fecha Inicio,Fecha Fin\n\
        Proyecto A,150000,Hito 1,20,2025-01-01,2025-01-31\n\
        Proyecto A,150000,Hito 2,80,2025-02-01,2025-02-28\n\
        Proyecto B,80000,Fase Única,1.0,2025-02-10,2025-02-10\n";

    async fn pipeline_with(config: MockConfig, input: &str) -> (MilestonePipeline<MockStorage, MockConfig>, MockStorage) {
        let storage = MockStorage::new();
        storage.put_file("hitos.csv", input.as_bytes()).await;
        (MilestonePipeline::new(storage.clone(), config), storage)
    }

    #[tokio::test]
    async fn test_extract_reads_input_table() {
        let (pipeline, _) = pipeline_with(MockConfig::new(&["csv"]), SAMPLE_CSV).await;

        let table = pipeline.extract().await.unwrap();
        assert_eq!(table.headers.len(), 6);
        assert_eq!(table.records.len(), 3);
    }

    #[tokio::test]
    async fn test_extract_missing_file() {
        let pipeline = MilestonePipeline::new(MockStorage::new(), MockConfig::new(&["csv"]));
        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, ForecastError::IoError(_)));
    }

    #[tokio::test]
    async fn test_transform_builds_matrix_and_audit() {
        let (pipeline, _) = pipeline_with(MockConfig::new(&["csv"]), SAMPLE_CSV).await;

        let table = pipeline.extract().await.unwrap();
        let result = pipeline.transform(table).await.unwrap();

        assert_eq!(result.matrix.rows.len(), 3);
        assert_eq!(result.matrix.months.len(), 2);
        assert_eq!(result.audit.entries.len(), 2);
        assert!(result.audit.entries.iter().all(|e| e.is_balanced()));
    }

    #[tokio::test]
    async fn test_load_writes_each_format() {
        let (pipeline, storage) = pipeline_with(MockConfig::new(&["xlsx", "csv", "json"]), SAMPLE_CSV).await;

        let table = pipeline.extract().await.unwrap();
        let result = pipeline.transform(table).await.unwrap();
        let output = pipeline.load(&result).await.unwrap();

        assert_eq!(output, "test_output");
        assert!(storage.get_file("reporte_proyeccion.xlsx").await.is_some());
        assert!(storage.get_file("reporte_proyeccion.csv").await.is_some());
        assert!(storage.get_file("auditoria.json").await.is_some());
    }

    #[tokio::test]
    async fn test_load_single_format_returns_file_path() {
        let (pipeline, _) = pipeline_with(MockConfig::new(&["csv"]), SAMPLE_CSV).await;

        let table = pipeline.extract().await.unwrap();
        let result = pipeline.transform(table).await.unwrap();

        let output = pipeline.load(&result).await.unwrap();
        assert_eq!(output, "test_output/reporte_proyeccion.csv");
    }

    #[tokio::test]
    async fn test_load_with_bundle() {
        let mut config = MockConfig::new(&["csv", "json"]);
        config.bundle = Some("reporte.zip".to_string());
        let (pipeline, storage) = pipeline_with(config, SAMPLE_CSV).await;

        let table = pipeline.extract().await.unwrap();
        let result = pipeline.transform(table).await.unwrap();
        let output = pipeline.load(&result).await.unwrap();

        assert_eq!(output, "test_output/reporte.zip");
        assert!(storage.get_file("reporte_proyeccion.csv").await.is_none());

        let zip_bytes = storage.get_file("reporte.zip").await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["auditoria.json", "reporte_proyeccion.csv"]);
    }

    #[tokio::test]
    async fn test_strict_dates_from_config() {
        let input = "Proyecto,Total Proyecto,Hito,% del Proyecto,Fecha Inicio,Fecha Fin\n\
            Proyecto A,1000,Hito 1,100,2025-03-10,2025-03-01\n";
        let mut config = MockConfig::new(&["csv"]);
        config.strict_dates = true;
        let (pipeline, _) = pipeline_with(config, input).await;

        let table = pipeline.extract().await.unwrap();
        let err = pipeline.transform(table).await.unwrap_err();
        assert!(matches!(err, ForecastError::DateRangeError { .. }));
    }
}
