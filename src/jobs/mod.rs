pub mod entities;
pub mod runner;

pub use entities::*;
pub use runner::*;
