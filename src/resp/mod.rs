// ABOUTME: RESP2/RESP3 wire protocol — value model, incremental reader, append-only writer

pub mod reader;
pub mod value;
pub mod writer;

pub use reader::{ReaderError, ReaderLimits};
pub use value::Value;
