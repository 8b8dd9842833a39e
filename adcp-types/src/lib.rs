pub mod array;
pub mod bottom_track;
pub mod error;
pub mod frame;
pub mod header;
pub mod leader;
pub mod series;
pub mod system_config;

pub use array::*;
pub use bottom_track::*;
pub use error::*;
pub use frame::*;
pub use header::*;
pub use leader::*;
pub use series::*;
pub use system_config::*;
