#![allow(non_snake_case)]

pub mod engine;
mod error;
mod malody_importer;
pub mod model;
mod pack;
mod util;
mod writer;

pub use engine::*;
pub use error::*;
pub use malody_importer::*;
pub use model::config::*;
pub use model::library::*;
pub use model::song::*;
pub use model::time::*;
pub use pack::*;
pub use util::*;
pub use writer::*;
