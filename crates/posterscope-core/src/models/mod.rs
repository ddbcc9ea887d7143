pub mod conference;
pub mod paper;
pub mod source_file;

pub use conference::*;
pub use paper::*;
pub use source_file::*;
