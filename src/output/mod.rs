//! Run output: the report file, the console summary and the JSON summary

pub mod json;
pub mod report;
pub mod text;

pub use report::{ReportOrder, ReportWriter};
