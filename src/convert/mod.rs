pub mod pandoc;

use crate::error::ConvertError;
use std::path::Path;

pub use pandoc::Pandoc;

pub trait Converter {
    /// Identifies the tool; fails if it cannot be run at all.
    fn version(&self) -> Result<String, ConvertError>;

    /// Converts `markdown` into `output`. Blocks until the tool exits.
    fn convert(&self, markdown: &Path, output: &Path, extra_args: &[String])
        -> Result<(), ConvertError>;
}

impl<T: Converter + ?Sized> Converter for &T {
    fn version(&self) -> Result<String, ConvertError> {
        (**self).version()
    }

    fn convert(
        &self,
        markdown: &Path,
        output: &Path,
        extra_args: &[String],
    ) -> Result<(), ConvertError> {
        (**self).convert(markdown, output, extra_args)
    }
}
