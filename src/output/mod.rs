pub use write_data::*;

pub mod helper;
pub mod write_data;
