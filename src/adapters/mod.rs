// 外部格式轉接：試算表讀取、報表輸出

pub mod report_writer;
pub mod table_reader;
