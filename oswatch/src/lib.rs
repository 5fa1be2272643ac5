#[macro_use]
extern crate lazy_static;

pub mod config;
pub mod decoder;
pub mod error;
pub mod fd_table;
pub mod leak_analyzer;
pub mod malloc_table;
pub mod mapping;
pub mod registers;
pub mod report;
pub mod report_render;
pub mod stats;
pub mod supervisor;
pub mod time;

pub use config::AppConfig;
pub use error::{OswatchError, OswatchResult};
pub use stats::ProcessStats;
pub use supervisor::launch;
