pub mod archive;
pub mod cli;
pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod latex;
pub mod materialize;
pub mod ocr;
pub mod pipeline;
pub mod report;
pub mod scanner;
pub mod util;
