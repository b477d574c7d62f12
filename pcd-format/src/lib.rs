pub mod adapters;
pub mod convert;
pub mod error;
pub mod format;
pub mod options;

pub use adapters::{FormatAdapter, MissingFieldPolicy};
pub use convert::{convert_batch, convert_file, BatchReport, ConversionJob};
pub use error::Error;
pub use format::Format;
pub use options::ConvertOptions;
