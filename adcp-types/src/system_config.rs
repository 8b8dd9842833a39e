use serde::{Deserialize, Serialize};

/// Направление лучей
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeamFacing {
    /// Лучи смотрят вниз
    Down,
    /// Лучи смотрят вверх
    Up,
}

/// Форма головки преобразователя
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeamPattern {
    Concave,
    Convex,
}

/// Вариант конфигурации датчиков
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorConfig {
    Config1,
    Config2,
    Config3,
}

/// Рабочая частота прибора
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Khz38,
    Khz75,
    Khz150,
    Khz300,
    Khz600,
    Khz1200,
    Khz2400,
}

/// Угол наклона лучей от вертикали
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeamAngle {
    Deg15,
    Deg20,
    Deg30,
    /// Значение берётся из байта угла фиксированного лидера
    Other,
}

/// Конфигурация Janus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JanusConfig {
    FourBeam,
    FiveBeamOneDemod,
    FiveBeamTwoDemod,
    /// Комбинация битов вне документированной таблицы
    Unknown,
}

/// Декодированное слово конфигурации системы.
///
/// Все поля `None` означают, что слово не удалось прочитать. Такой объект
/// эквивалентен отсутствию фиксированного лидера.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfiguration {
    pub beam_facing: Option<BeamFacing>,
    pub head_attached: Option<bool>,
    pub sensor_config: Option<SensorConfig>,
    pub beam_pattern: Option<BeamPattern>,
    pub frequency: Option<Frequency>,
    pub janus_config: Option<JanusConfig>,
    pub beam_angle: Option<BeamAngle>,
}

impl BeamPattern {
    /// Знак `c` в матрице beam -> instrument: convex = +1, concave = -1.
    pub fn sign(&self) -> f64 {
        match self {
            BeamPattern::Convex => 1.0,
            BeamPattern::Concave => -1.0,
        }
    }
}

impl Frequency {
    pub fn khz(&self) -> f64 {
        match self {
            Frequency::Khz38 => 38.4,
            Frequency::Khz75 => 76.8,
            Frequency::Khz150 => 153.6,
            Frequency::Khz300 => 307.2,
            Frequency::Khz600 => 614.4,
            Frequency::Khz1200 => 1228.8,
            Frequency::Khz2400 => 2457.6,
        }
    }
}

impl BeamAngle {
    /// Угол в градусах; `None` для [`BeamAngle::Other`].
    pub fn degrees(&self) -> Option<f64> {
        match self {
            BeamAngle::Deg15 => Some(15.0),
            BeamAngle::Deg20 => Some(20.0),
            BeamAngle::Deg30 => Some(30.0),
            BeamAngle::Other => None,
        }
    }
}

impl SystemConfiguration {
    /// Полностью неопределённая конфигурация.
    pub fn undefined() -> Self {
        Self::default()
    }

    pub fn is_defined(&self) -> bool {
        *self != Self::undefined()
    }

    pub fn is_down_looking(&self) -> bool {
        self.beam_facing == Some(BeamFacing::Down)
    }
}
