use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{CoordinateTransform, SystemConfiguration};

/// Фиксированный лидер: конфигурация прибора, обычно постоянная по файлу.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixedLeader {
    pub cpu_fw_version: u8,
    pub cpu_fw_revision: u8,
    /// Декодированное слово конфигурации
    pub system_configuration: SystemConfiguration,
    /// Исходные байты слова конфигурации (LSB, MSB)
    pub system_configuration_raw: [u8; 2],
    pub real_sim_flag: u8,
    pub lag_length: u8,
    pub n_beams: u8,
    pub n_cells: u8,
    pub pings_per_ensemble: u16,
    /// Длина ячейки, см
    pub cell_length_cm: u16,
    /// Бланкинг после излучения, см
    pub blank_after_transmit_cm: u16,
    pub profiling_mode: u8,
    pub low_correlation_threshold: u8,
    pub n_code_repetitions: u8,
    pub percent_good_min: u8,
    /// Порог скорости ошибки, мм/с
    pub error_velocity_max: u16,
    pub tpp_minutes: u8,
    pub tpp_seconds: u8,
    pub tpp_hundredths: u8,
    pub coordinate_transform: CoordinateTransform,
    /// Выравнивание курса, 0.01°
    pub heading_alignment: i16,
    /// Смещение курса, 0.01°
    pub heading_bias: i16,
    pub sensor_source: u8,
    pub sensors_available: u8,
    /// Расстояние до центра первой ячейки, см
    pub bin1_distance_cm: u16,
    /// Длина излучаемого импульса, см
    pub transmit_pulse_length_cm: u16,
    pub ref_layer_start: u8,
    pub ref_layer_end: u8,
    pub false_target_threshold: u8,
    pub spare: u8,
    pub transmit_lag_distance_cm: u16,
    pub cpu_board_serial: Vec<u8>,
    /// 0: широкополосный, 1: узкополосный режим
    pub system_bandwidth: u16,
    pub system_power: u8,
    pub spare2: u8,
    pub instrument_serial: u32,
    /// Угол лучей в градусах (прошивки, где он записан отдельным байтом)
    pub beam_angle: u8,
}

/// Переменный лидер: состояние прибора в момент ансамбля.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableLeader {
    pub ensemble_number: u16,
    pub rtc_year: u8,
    pub rtc_month: u8,
    pub rtc_day: u8,
    pub rtc_hour: u8,
    pub rtc_minute: u8,
    pub rtc_second: u8,
    pub rtc_hundredths: u8,
    pub ensemble_number_msb: u8,
    pub bit_result: u16,
    /// Скорость звука, м/с
    pub speed_of_sound: u16,
    /// Глубина преобразователя, дм
    pub depth_of_transducer: u16,
    /// Курс, 0.01°
    pub heading: u16,
    /// Дифферент, 0.01°
    pub pitch: i16,
    /// Крен, 0.01°
    pub roll: i16,
    /// Солёность, ppt
    pub salinity: u16,
    /// Температура, 0.01 °C
    pub temperature: i16,
    pub mpt_minutes: u8,
    pub mpt_seconds: u8,
    pub mpt_hundredths: u8,
    pub heading_std: u8,
    /// 0.1°
    pub pitch_std: u8,
    /// 0.1°
    pub roll_std: u8,
    pub adc_channels: [u8; 8],
    pub error_status_word: u32,
    pub reserved: u16,
    /// Давление, декапаскали
    pub pressure: u32,
    pub pressure_variance: u32,
    pub spare: u8,
    pub y2k_century: u8,
    pub y2k_year: u8,
    pub y2k_month: u8,
    pub y2k_day: u8,
    pub y2k_hour: u8,
    pub y2k_minute: u8,
    pub y2k_second: u8,
    pub y2k_hundredths: u8,
}

impl FixedLeader {
    pub fn cell_length_m(&self) -> f64 {
        self.cell_length_cm as f64 / 100.0
    }

    pub fn bin1_distance_m(&self) -> f64 {
        self.bin1_distance_cm as f64 / 100.0
    }

    pub fn transmit_pulse_length_m(&self) -> f64 {
        self.transmit_pulse_length_cm as f64 / 100.0
    }

    pub fn is_broadband(&self) -> bool {
        self.system_bandwidth == 0
    }

    /// Угол лучей: из слова конфигурации, иначе из отдельного байта.
    pub fn beam_angle_deg(&self) -> f64 {
        self.system_configuration
            .beam_angle
            .and_then(|a| a.degrees())
            .unwrap_or(self.beam_angle as f64)
    }

    /// Расстояния (вдоль вертикали прибора) до центров ячеек, м.
    pub fn bin_centers_m(&self) -> Vec<f64> {
        let first = self.bin1_distance_m();
        let len = self.cell_length_m();

        (0..self.n_cells as usize)
            .map(|i| first + i as f64 * len)
            .collect()
    }
}

impl VariableLeader {
    /// Полный номер ансамбля с учётом старшего байта.
    pub fn ensemble_index(&self) -> u32 {
        self.ensemble_number as u32 + ((self.ensemble_number_msb as u32) << 16)
    }

    /// Время ансамбля: Y2K часы, если заполнен век, иначе двухзначный год.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        let (year, month, day, hour, minute, second, hundredths) = if self.y2k_century != 0 {
            (
                self.y2k_century as i32 * 100 + self.y2k_year as i32,
                self.y2k_month,
                self.y2k_day,
                self.y2k_hour,
                self.y2k_minute,
                self.y2k_second,
                self.y2k_hundredths,
            )
        } else {
            (
                2000 + self.rtc_year as i32,
                self.rtc_month,
                self.rtc_day,
                self.rtc_hour,
                self.rtc_minute,
                self.rtc_second,
                self.rtc_hundredths,
            )
        };

        NaiveDate::from_ymd_opt(year, month as u32, day as u32)?.and_hms_milli_opt(
            hour as u32,
            minute as u32,
            second as u32,
            hundredths as u32 * 10,
        )
    }

    pub fn heading_deg(&self) -> f64 {
        self.heading as f64 / 100.0
    }

    pub fn pitch_deg(&self) -> f64 {
        self.pitch as f64 / 100.0
    }

    pub fn roll_deg(&self) -> f64 {
        self.roll as f64 / 100.0
    }

    pub fn temperature_c(&self) -> f64 {
        self.temperature as f64 / 100.0
    }

    pub fn depth_of_transducer_m(&self) -> f64 {
        self.depth_of_transducer as f64 / 10.0
    }

    /// Давление в децибарах (1 дбар = 1000 даПа).
    pub fn pressure_dbar(&self) -> f64 {
        self.pressure as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{BeamAngle, SystemConfiguration};

    #[test]
    fn test_bin_centers() {
        let fl = FixedLeader {
            n_cells: 3,
            cell_length_cm: 50,
            bin1_distance_cm: 176,
            ..FixedLeader::default()
        };
        let centers = fl.bin_centers_m();
        assert_eq!(centers.len(), 3);
        assert_relative_eq!(centers[0], 1.76);
        assert_relative_eq!(centers[2], 2.76);
    }

    #[test]
    fn test_beam_angle_fallback() {
        let mut fl = FixedLeader {
            beam_angle: 25,
            ..FixedLeader::default()
        };
        assert_eq!(fl.beam_angle_deg(), 25.0);

        fl.system_configuration = SystemConfiguration {
            beam_angle: Some(BeamAngle::Deg20),
            ..SystemConfiguration::undefined()
        };
        assert_eq!(fl.beam_angle_deg(), 20.0);
    }

    #[test]
    fn test_timestamp_y2k_and_legacy() {
        let mut vl = VariableLeader {
            rtc_year: 24,
            rtc_month: 3,
            rtc_day: 15,
            rtc_hour: 12,
            rtc_minute: 30,
            rtc_second: 5,
            rtc_hundredths: 50,
            ..VariableLeader::default()
        };
        let ts = vl.timestamp().unwrap();
        assert_eq!(ts.to_string(), "2024-03-15 12:30:05.500");

        vl.y2k_century = 20;
        vl.y2k_year = 23;
        vl.y2k_month = 1;
        vl.y2k_day = 2;
        assert_eq!(vl.timestamp().unwrap().to_string(), "2023-01-02 00:00:00");

        vl.y2k_month = 13;
        assert!(vl.timestamp().is_none());
    }

    #[test]
    fn test_scaled_attitude() {
        let vl = VariableLeader {
            heading: 35_999,
            pitch: -150,
            roll: 275,
            temperature: 1234,
            ensemble_number: 5,
            ensemble_number_msb: 1,
            pressure: 10_500,
            ..VariableLeader::default()
        };
        assert_relative_eq!(vl.heading_deg(), 359.99);
        assert_relative_eq!(vl.pitch_deg(), -1.5);
        assert_relative_eq!(vl.roll_deg(), 2.75);
        assert_relative_eq!(vl.temperature_c(), 12.34);
        assert_relative_eq!(vl.pressure_dbar(), 10.5);
        assert_eq!(vl.ensemble_index(), 65_541);
    }
}
