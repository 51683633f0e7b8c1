//! 结果格式化与导出（JSON 文件、Excel 透视表）

pub mod export;
pub mod formatter;

pub use export::{
    flatten_rows, json_to_xlsx, resolve_temp_file, save_result_json, Row,
};
pub use formatter::{format_result, format_text};
