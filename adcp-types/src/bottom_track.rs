use serde::{Deserialize, Serialize};

/// Значение скорости, которым прибор помечает отсутствие данных.
pub const BAD_VELOCITY: i16 = -32768;

/// Секция донного трекинга одного ансамбля.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BottomTrack {
    pub pings_per_ensemble: u16,
    pub delay_before_reacquire: u16,
    pub correlation_min: u8,
    pub evaluation_amplitude_min: u8,
    pub percent_good_min: u8,
    pub mode: u8,
    /// мм/с
    pub error_velocity_max: u16,
    pub reserved: u32,
    /// Младшие 16 бит дальности по лучам, см
    pub range_lsb: [u16; 4],
    /// Скорость по лучам, мм/с
    pub velocity: [i16; 4],
    pub correlation: [u8; 4],
    pub evaluation_amplitude: [u8; 4],
    pub percent_good: [u8; 4],
    /// дм
    pub ref_layer_min: u16,
    /// дм
    pub ref_layer_near: u16,
    /// дм
    pub ref_layer_far: u16,
    pub ref_layer_velocity: [i16; 4],
    pub ref_layer_correlation: [u8; 4],
    pub ref_layer_intensity: [u8; 4],
    pub ref_layer_percent_good: [u8; 4],
    /// дм
    pub max_depth: u16,
    pub rssi_amplitude: [u8; 4],
    pub gain: u8,
    /// Старший байт дальности по лучам (единицы 65536 см)
    pub range_msb: [u8; 4],
}

impl BottomTrack {
    /// Заглушка для ансамбля без секции: дальности 0, скорости помечены
    /// маркером отсутствия данных.
    pub fn missing() -> Self {
        Self {
            velocity: [BAD_VELOCITY; 4],
            ref_layer_velocity: [BAD_VELOCITY; 4],
            ..Self::default()
        }
    }

    /// Наклонная дальность до дна по лучу, м. 0 означает отсутствие
    /// обнаружения и возвращается как NaN.
    pub fn range_m(
        &self,
        beam: usize,
    ) -> f64 {
        let cm = self.range_lsb[beam] as u32 + ((self.range_msb[beam] as u32) << 16);

        if cm == 0 {
            f64::NAN
        } else {
            cm as f64 / 100.0
        }
    }

    /// Скорость луча в м/с; NaN для маркера отсутствия данных.
    pub fn velocity_m_s(
        &self,
        beam: usize,
    ) -> f64 {
        scale_velocity(self.velocity[beam])
    }
}

/// Переводит отсчёт скорости (мм/с) в м/с.
pub fn scale_velocity(raw: i16) -> f64 {
    if raw == BAD_VELOCITY {
        f64::NAN
    } else {
        raw as f64 / 1000.0
    }
}
