mod database;
mod text;
mod types;

pub use database::*;
pub use text::*;
pub use types::*;
