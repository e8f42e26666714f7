pub mod archive;
pub mod desc;
pub mod error;
