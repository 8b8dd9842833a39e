use thiserror::Error;

use crate::CoordinateFrame;

/// Результат для операций ADCP
pub type AdcpResult<T> = std::result::Result<T, AdcpError>;

/// Типы ошибок декодирования и обработки ADCP.
#[derive(Debug, Error)]
pub enum AdcpError {
    /// Нарушение структуры файла PD0 (нет синхронизации, невозможная
    /// геометрия массивов)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Преобразование между системами координат не определено
    #[error("Unsupported transform: {from} -> {to}")]
    UnsupportedTransform {
        from: CoordinateFrame,
        to: CoordinateFrame,
    },

    /// Некорректная конфигурация или входные данные вызывающей стороны
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Вырожденная геометрия лучей (угол 0°, число лучей != 4)
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Ошибки ввода/вывода (автоконвертируются из std::io::Error)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdcpError {
    /// Удобные конструкторы
    pub fn decode<S: Into<String>>(s: S) -> Self {
        Self::Decode(s.into())
    }

    pub fn configuration<S: Into<String>>(s: S) -> Self {
        Self::Configuration(s.into())
    }

    pub fn invalid_geometry<S: Into<String>>(s: S) -> Self {
        Self::InvalidGeometry(s.into())
    }

    pub fn unsupported(
        from: CoordinateFrame,
        to: CoordinateFrame,
    ) -> Self {
        Self::UnsupportedTransform { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = AdcpError::unsupported(CoordinateFrame::Earth, CoordinateFrame::Ship);
        assert_eq!(e.to_string(), "Unsupported transform: earth -> ship");

        let e = AdcpError::configuration("err_vel_max must be a number or \"auto\"");
        assert!(e.to_string().starts_with("Configuration error"));
    }
}
