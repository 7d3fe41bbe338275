use crate::core::normalizer::ScaleMode;
use crate::domain::model::{ForecastResult, RawTable};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn sheet(&self) -> Option<&str>;
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn scale_mode(&self) -> ScaleMode;
    /// 平衡判定的容許誤差（百分點）
    fn audit_tolerance(&self) -> f64;
    fn strict_dates(&self) -> bool;
    fn totals_label(&self) -> &str;
    /// ZIP 檔名；`None` 表示不壓縮
    fn bundle_name(&self) -> Option<&str>;

    /// 各輸出格式的檔名
    fn file_name(&self, format: &str) -> String {
        match format {
            "json" => "auditoria.json".to_string(),
            other => format!("reporte_proyeccion.{}", other),
        }
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<RawTable>;
    async fn transform(&self, table: RawTable) -> Result<ForecastResult>;
    async fn load(&self, result: &ForecastResult) -> Result<String>;
}
