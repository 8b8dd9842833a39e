//! Обработка декодированных данных ADCP.
//!
//! Преобразование скоростей между системами координат, абсолютное обратное
//! рассеяние и концентрация взвеси, геометрия дна по донному трекингу и
//! маски качества. Всё собирается в [`Survey`], который кеширует
//! производные массивы и применяет маски при чтении.
//!
//! ```no_run
//! use adcp_processing::{ProcessingConfig, Survey};
//! use adcp_types::CoordinateFrame;
//!
//! let config = ProcessingConfig::from_path("processing.json")?;
//! let mut survey = Survey::open("survey.000", config, 1)?;
//!
//! let speed = survey.speed(CoordinateFrame::Earth)?;
//! println!("{:?} speed cells", speed.shape());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod absorption;
pub mod backscatter;
pub mod config;
pub mod export;
pub mod geometry;
pub mod mask;
pub mod navigation;
pub mod rotation;
pub mod survey;
pub mod transform;

pub use backscatter::{AcousticBackscatterEngine, SonarParameters};
pub use config::*;
pub use export::{EnsembleSummary, SurveyExporter, SurveyReport};
pub use geometry::BottomTrackGeometryEngine;
pub use mask::{MaskInputs, QualityMaskEngine};
pub use navigation::{Attitude, Navigation, Positions};
pub use rotation::{Matrix3, Matrix4};
pub use survey::Survey;
pub use transform::{CoordinateTransformEngine, VelocityField};
