use serde::{Deserialize, Serialize};

/// Система координат, в которой представлены скорости.
///
/// Порядок вариантов совпадает с направлением разрешённых преобразований:
/// `Beam -> Instrument -> Ship -> Earth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CoordinateFrame {
    /// Радиальные скорости вдоль лучей
    Beam = 0,
    /// X/Y/Z прибора
    Instrument = 1,
    /// Starboard/Forward/Up судна
    Ship = 2,
    /// East/North/Up
    Earth = 3,
}

/// Декодированный байт преобразования координат (команда EX).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateTransform {
    /// Система координат, в которой прибор записал скорости
    pub frame: CoordinateFrame,
    /// Прибор применял крен/дифферент при записи
    pub tilts_used: bool,
    /// Разрешено 3-лучевое решение
    pub three_beam: bool,
    /// Включено отображение ячеек (bin mapping)
    pub bin_mapping: bool,
}

impl CoordinateFrame {
    /// Все системы в порядке цепочки преобразований.
    pub const ALL: [CoordinateFrame; 4] = [
        CoordinateFrame::Beam,
        CoordinateFrame::Instrument,
        CoordinateFrame::Ship,
        CoordinateFrame::Earth,
    ];

    /// Биты 4..3 байта EX.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => CoordinateFrame::Beam,
            0b01 => CoordinateFrame::Instrument,
            0b10 => CoordinateFrame::Ship,
            _ => CoordinateFrame::Earth,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Имена четырёх компонент скорости в этой системе.
    pub fn component_names(&self) -> [&'static str; 4] {
        match self {
            CoordinateFrame::Beam => ["beam1", "beam2", "beam3", "beam4"],
            CoordinateFrame::Instrument => ["x", "y", "z", "error"],
            CoordinateFrame::Ship => ["starboard", "forward", "up", "error"],
            CoordinateFrame::Earth => ["east", "north", "up", "error"],
        }
    }
}

impl CoordinateTransform {
    pub fn from_byte(b: u8) -> Self {
        Self {
            frame: CoordinateFrame::from_bits(b >> 3),
            tilts_used: b & 0b100 != 0,
            three_beam: b & 0b010 != 0,
            bin_mapping: b & 0b001 != 0,
        }
    }
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self::from_byte(0)
    }
}

impl std::fmt::Display for CoordinateFrame {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            CoordinateFrame::Beam => write!(f, "beam"),
            CoordinateFrame::Instrument => write!(f, "instrument"),
            CoordinateFrame::Ship => write!(f, "ship"),
            CoordinateFrame::Earth => write!(f, "earth"),
        }
    }
}

impl std::str::FromStr for CoordinateFrame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beam" => Ok(CoordinateFrame::Beam),
            "instrument" | "inst" | "xyz" => Ok(CoordinateFrame::Instrument),
            "ship" => Ok(CoordinateFrame::Ship),
            "earth" | "enu" => Ok(CoordinateFrame::Earth),
            _ => Err(format!(
                "Unknown coordinate frame: '{s}'. Use: beam, instrument, ship, earth"
            )),
        }
    }
}
