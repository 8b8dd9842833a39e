use serde::{Deserialize, Serialize};

use crate::{AdcpError, AdcpResult};

/// Величина, постоянная для всего файла или заданная по ансамблям.
///
/// Используется для навигации и ориентации: курс от гирокомпаса может быть
/// рядом значений, а смещение антенны: одной константой.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Series {
    Constant(f64),
    Variable(Vec<f64>),
}

impl Series {
    /// Разворачивает величину в вектор длиной `n`.
    ///
    /// Для `Variable` длина должна совпадать с `n`.
    pub fn broadcast(
        &self,
        n: usize,
    ) -> AdcpResult<Vec<f64>> {
        match self {
            Series::Constant(v) => Ok(vec![*v; n]),
            Series::Variable(values) if values.len() == n => Ok(values.clone()),
            Series::Variable(values) => Err(AdcpError::configuration(format!(
                "series length {} does not match ensemble count {n}",
                values.len()
            ))),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Series::Constant(_))
    }
}

impl Default for Series {
    fn default() -> Self {
        Series::Constant(0.0)
    }
}

impl From<f64> for Series {
    fn from(v: f64) -> Self {
        Series::Constant(v)
    }
}

impl From<Vec<f64>> for Series {
    fn from(v: Vec<f64>) -> Self {
        Series::Variable(v)
    }
}
