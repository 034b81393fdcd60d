pub mod digest;
pub mod extractor;
pub mod jwt;
pub mod test_utils;
