pub mod amortization;
pub mod auditor;
pub mod etl;
pub mod forecast;
pub mod normalizer;
pub mod pipeline;
pub mod schema;

pub use crate::domain::model::{ForecastResult, RawTable, Record};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
