//! Описание двоичного формата PD0.
//!
//! Ансамбль:
//! ```text
//! [0..2]   SYNC            0x7F 0x7F
//! [2..4]   N_BYTES         u16 : длина ансамбля без контрольной суммы
//! [4]      SPARE
//! [5]      N_DATA_TYPES    u8
//! [6..]    OFFSETS         u16 × N_DATA_TYPES: смещения секций
//! ...      секции (ID u16 + данные)
//! [N_BYTES..N_BYTES+2]     CHECKSUM u16: сумма байт ансамбля mod 65536
//! ```
//! Все многобайтовые числа little-endian.

use crate::binary::{
    FieldDef,
    FieldKind::{Bytes, I16, U16, U32, U8},
};

/// Байт синхронизации ансамбля (ID заголовка и ID источника)
pub const PD0_SYNC: [u8; 2] = [0x7F, 0x7F];

/// Размер фиксированной части заголовка до таблицы смещений
pub const HEADER_FIXED_SIZE: usize = 6;

/// Размер контрольной суммы в конце ансамбля
pub const CHECKSUM_SIZE: usize = 2;

/// Размер ID секции
pub const SECTION_ID_SIZE: usize = 2;

/// Предел числа секций в одном ансамбле
pub const MAX_DATA_TYPES: u8 = 32;

/// Максимальное число лучей, которое считается осмысленным
pub const MAX_BEAMS: u8 = 8;

/// Предел числа кандидатов синхро при поиске первого ансамбля
pub const MAX_SYNC_ATTEMPTS: usize = 1_000;

/// Окно поиска синхро от начала файла (байт)
pub const SYNC_SEARCH_WINDOW: usize = 1024 * 1024;

/// Секции ансамбля.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    FixedLeader,
    VariableLeader,
    Velocity,
    Correlation,
    EchoIntensity,
    PercentGood,
    Status,
    BottomTrack,
}

impl SectionKind {
    /// ID секции, записанный в её первых двух байтах.
    pub fn id(&self) -> u16 {
        match self {
            SectionKind::FixedLeader => 0x0000,
            SectionKind::VariableLeader => 0x0080,
            SectionKind::Velocity => 0x0100,
            SectionKind::Correlation => 0x0200,
            SectionKind::EchoIntensity => 0x0300,
            SectionKind::PercentGood => 0x0400,
            SectionKind::Status => 0x0500,
            SectionKind::BottomTrack => 0x0600,
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            0x0000 | 0x0001 => Some(SectionKind::FixedLeader),
            0x0080 | 0x0081 => Some(SectionKind::VariableLeader),
            0x0100 => Some(SectionKind::Velocity),
            0x0200 => Some(SectionKind::Correlation),
            0x0300 => Some(SectionKind::EchoIntensity),
            0x0400 => Some(SectionKind::PercentGood),
            0x0500 => Some(SectionKind::Status),
            0x0600 => Some(SectionKind::BottomTrack),
            _ => None,
        }
    }

    /// Секция по её позиции в таблице смещений (стандартный порядок).
    pub fn from_position(index: usize) -> Option<Self> {
        match index {
            0 => Some(SectionKind::FixedLeader),
            1 => Some(SectionKind::VariableLeader),
            2 => Some(SectionKind::Velocity),
            3 => Some(SectionKind::Correlation),
            4 => Some(SectionKind::EchoIntensity),
            5 => Some(SectionKind::PercentGood),
            6 => Some(SectionKind::BottomTrack),
            _ => None,
        }
    }
}

/// Фиксированная часть заголовка.
pub const HEADER_FIELDS: &[FieldDef] = &[
    FieldDef::le("header_id", U8),
    FieldDef::le("source_id", U8),
    FieldDef::le("n_bytes", U16),
    FieldDef::le("spare", U8),
    FieldDef::le("n_data_types", U8),
];

/// Фиксированный лидер, 59 байт.
pub const FIXED_LEADER_FIELDS: &[FieldDef] = &[
    FieldDef::le("id", U16),
    FieldDef::le("cpu_fw_version", U8),
    FieldDef::le("cpu_fw_revision", U8),
    FieldDef::raw("system_configuration", 2),
    FieldDef::le("real_sim_flag", U8),
    FieldDef::le("lag_length", U8),
    FieldDef::le("n_beams", U8),
    FieldDef::le("n_cells", U8),
    FieldDef::le("pings_per_ensemble", U16),
    FieldDef::le("cell_length", U16),
    FieldDef::le("blank_after_transmit", U16),
    FieldDef::le("profiling_mode", U8),
    FieldDef::le("low_correlation_threshold", U8),
    FieldDef::le("n_code_repetitions", U8),
    FieldDef::le("percent_good_min", U8),
    FieldDef::le("error_velocity_max", U16),
    FieldDef::le("tpp_minutes", U8),
    FieldDef::le("tpp_seconds", U8),
    FieldDef::le("tpp_hundredths", U8),
    FieldDef::le("coordinate_transform", U8),
    FieldDef::le("heading_alignment", I16),
    FieldDef::le("heading_bias", I16),
    FieldDef::le("sensor_source", U8),
    FieldDef::le("sensors_available", U8),
    FieldDef::le("bin1_distance", U16),
    FieldDef::le("transmit_pulse_length", U16),
    FieldDef::le("ref_layer_start", U8),
    FieldDef::le("ref_layer_end", U8),
    FieldDef::le("false_target_threshold", U8),
    FieldDef::le("spare", U8),
    FieldDef::le("transmit_lag_distance", U16),
    FieldDef::raw("cpu_board_serial", 8),
    FieldDef::le("system_bandwidth", U16),
    FieldDef::le("system_power", U8),
    FieldDef::le("spare2", U8),
    FieldDef::le("instrument_serial", U32),
    FieldDef::le("beam_angle", U8),
];

/// Переменный лидер, 65 байт.
pub const VARIABLE_LEADER_FIELDS: &[FieldDef] = &[
    FieldDef::le("id", U16),
    FieldDef::le("ensemble_number", U16),
    FieldDef::le("rtc_year", U8),
    FieldDef::le("rtc_month", U8),
    FieldDef::le("rtc_day", U8),
    FieldDef::le("rtc_hour", U8),
    FieldDef::le("rtc_minute", U8),
    FieldDef::le("rtc_second", U8),
    FieldDef::le("rtc_hundredths", U8),
    FieldDef::le("ensemble_number_msb", U8),
    FieldDef::le("bit_result", U16),
    FieldDef::le("speed_of_sound", U16),
    FieldDef::le("depth_of_transducer", U16),
    FieldDef::le("heading", U16),
    FieldDef::le("pitch", I16),
    FieldDef::le("roll", I16),
    FieldDef::le("salinity", U16),
    FieldDef::le("temperature", I16),
    FieldDef::le("mpt_minutes", U8),
    FieldDef::le("mpt_seconds", U8),
    FieldDef::le("mpt_hundredths", U8),
    FieldDef::le("heading_std", U8),
    FieldDef::le("pitch_std", U8),
    FieldDef::le("roll_std", U8),
    FieldDef::le("adc_channels", Bytes(8)),
    FieldDef::le("error_status_word", U32),
    FieldDef::le("reserved", U16),
    FieldDef::le("pressure", U32),
    FieldDef::le("pressure_variance", U32),
    FieldDef::le("spare", U8),
    FieldDef::le("y2k_century", U8),
    FieldDef::le("y2k_year", U8),
    FieldDef::le("y2k_month", U8),
    FieldDef::le("y2k_day", U8),
    FieldDef::le("y2k_hour", U8),
    FieldDef::le("y2k_minute", U8),
    FieldDef::le("y2k_second", U8),
    FieldDef::le("y2k_hundredths", U8),
];

/// Донный трекинг, 81 байт (хвостовые резервные байты не читаются).
pub const BOTTOM_TRACK_FIELDS: &[FieldDef] = &[
    FieldDef::le("id", U16),
    FieldDef::le("pings_per_ensemble", U16),
    FieldDef::le("delay_before_reacquire", U16),
    FieldDef::le("correlation_min", U8),
    FieldDef::le("evaluation_amplitude_min", U8),
    FieldDef::le("percent_good_min", U8),
    FieldDef::le("mode", U8),
    FieldDef::le("error_velocity_max", U16),
    FieldDef::le("reserved", U32),
    FieldDef::le("range_1", U16),
    FieldDef::le("range_2", U16),
    FieldDef::le("range_3", U16),
    FieldDef::le("range_4", U16),
    FieldDef::le("velocity_1", I16),
    FieldDef::le("velocity_2", I16),
    FieldDef::le("velocity_3", I16),
    FieldDef::le("velocity_4", I16),
    FieldDef::le("correlation_1", U8),
    FieldDef::le("correlation_2", U8),
    FieldDef::le("correlation_3", U8),
    FieldDef::le("correlation_4", U8),
    FieldDef::le("evaluation_amplitude_1", U8),
    FieldDef::le("evaluation_amplitude_2", U8),
    FieldDef::le("evaluation_amplitude_3", U8),
    FieldDef::le("evaluation_amplitude_4", U8),
    FieldDef::le("percent_good_1", U8),
    FieldDef::le("percent_good_2", U8),
    FieldDef::le("percent_good_3", U8),
    FieldDef::le("percent_good_4", U8),
    FieldDef::le("ref_layer_min", U16),
    FieldDef::le("ref_layer_near", U16),
    FieldDef::le("ref_layer_far", U16),
    FieldDef::le("ref_velocity_1", I16),
    FieldDef::le("ref_velocity_2", I16),
    FieldDef::le("ref_velocity_3", I16),
    FieldDef::le("ref_velocity_4", I16),
    FieldDef::le("ref_correlation_1", U8),
    FieldDef::le("ref_correlation_2", U8),
    FieldDef::le("ref_correlation_3", U8),
    FieldDef::le("ref_correlation_4", U8),
    FieldDef::le("ref_intensity_1", U8),
    FieldDef::le("ref_intensity_2", U8),
    FieldDef::le("ref_intensity_3", U8),
    FieldDef::le("ref_intensity_4", U8),
    FieldDef::le("ref_percent_good_1", U8),
    FieldDef::le("ref_percent_good_2", U8),
    FieldDef::le("ref_percent_good_3", U8),
    FieldDef::le("ref_percent_good_4", U8),
    FieldDef::le("max_depth", U16),
    FieldDef::le("rssi_amplitude_1", U8),
    FieldDef::le("rssi_amplitude_2", U8),
    FieldDef::le("rssi_amplitude_3", U8),
    FieldDef::le("rssi_amplitude_4", U8),
    FieldDef::le("gain", U8),
    FieldDef::le("range_msb_1", U8),
    FieldDef::le("range_msb_2", U8),
    FieldDef::le("range_msb_3", U8),
    FieldDef::le("range_msb_4", U8),
];

/// Контрольная сумма ансамбля: сумма байт mod 65536.
pub fn pd0_checksum(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}
