//! Декодер двоичного формата PD0 (Teledyne RDI ADCP).
//!
//! Файл состоит из ансамблей фиксированной длины. Каждый ансамбль начинается
//! с синхро `0x7F7F`, содержит таблицу смещений секций и заканчивается
//! контрольной суммой.
//!
//! # Быстрый старт
//!
//! ```no_run
//! use adcp_core::Pd0Reader;
//!
//! let mut reader = Pd0Reader::open("survey.000")?;
//! let data = reader.read_all()?;
//!
//! println!(
//!     "{} ensembles, {} cells x {} beams",
//!     data.n_ensembles(),
//!     data.n_cells(),
//!     data.n_beams()
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod arrays;
pub mod binary;
pub mod dataset;
#[cfg(feature = "fixtures")]
pub mod fixtures;
pub mod format;
pub mod parallel;
pub mod reader;
pub mod sections;
pub mod system_config;

pub use arrays::*;
pub use binary::*;
pub use dataset::*;
#[cfg(feature = "fixtures")]
pub use fixtures::Pd0Builder;
pub use format::*;
pub use parallel::decode_parallel;
pub use reader::{EnsembleLayout, Pd0Reader};
pub use sections::*;
pub use system_config::*;

/// Версия библиотеки.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
