pub mod common;
pub mod env;
pub mod extractor;
pub mod maybe;
