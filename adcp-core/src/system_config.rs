//! Декодирование двухбайтового слова конфигурации системы.
//!
//! ```text
//! LSB: bit 7   : направление (0 вниз, 1 вверх)
//!      bit 6   : головка подключена
//!      bit 5..4: конфигурация датчиков
//!      bit 3   : форма головки (0 concave, 1 convex)
//!      bit 2..0: частота
//! MSB: bit 7..4: конфигурация Janus
//!      bit 1..0: угол лучей
//! ```

use adcp_types::{
    BeamAngle, BeamFacing, BeamPattern, Frequency, JanusConfig, SensorConfig, SystemConfiguration,
};

/// Декодер слова конфигурации для типов из `adcp-types`.
pub trait SystemConfigurationExt: Sized {
    /// `raw`: байты в порядке файла (LSB, MSB). Любая длина кроме 2 даёт
    /// полностью неопределённую конфигурацию.
    fn decode(raw: &[u8]) -> Self;
}

impl SystemConfigurationExt for SystemConfiguration {
    fn decode(raw: &[u8]) -> Self {
        let [lsb, msb] = match raw {
            [lsb, msb] => [*lsb, *msb],
            _ => return SystemConfiguration::undefined(),
        };

        SystemConfiguration {
            beam_facing: Some(beam_facing(lsb)),
            head_attached: Some(lsb & 0b0100_0000 != 0),
            sensor_config: sensor_config(lsb),
            beam_pattern: Some(beam_pattern(lsb)),
            frequency: frequency(lsb),
            janus_config: Some(janus_config(msb)),
            beam_angle: Some(beam_angle(msb)),
        }
    }
}

fn beam_facing(lsb: u8) -> BeamFacing {
    if lsb & 0b1000_0000 != 0 {
        BeamFacing::Up
    } else {
        BeamFacing::Down
    }
}

fn beam_pattern(lsb: u8) -> BeamPattern {
    if lsb & 0b0000_1000 != 0 {
        BeamPattern::Convex
    } else {
        BeamPattern::Concave
    }
}

fn sensor_config(lsb: u8) -> Option<SensorConfig> {
    match (lsb >> 4) & 0b11 {
        0b00 => Some(SensorConfig::Config1),
        0b01 => Some(SensorConfig::Config2),
        0b10 => Some(SensorConfig::Config3),
        _ => None,
    }
}

fn frequency(lsb: u8) -> Option<Frequency> {
    match lsb & 0b111 {
        0b000 => Some(Frequency::Khz75),
        0b001 => Some(Frequency::Khz150),
        0b010 => Some(Frequency::Khz300),
        0b011 => Some(Frequency::Khz600),
        0b100 => Some(Frequency::Khz1200),
        0b101 => Some(Frequency::Khz2400),
        0b110 => Some(Frequency::Khz38),
        _ => None,
    }
}

fn beam_angle(msb: u8) -> BeamAngle {
    match msb & 0b11 {
        0b00 => BeamAngle::Deg15,
        0b01 => BeamAngle::Deg20,
        0b10 => BeamAngle::Deg30,
        _ => BeamAngle::Other,
    }
}

fn janus_config(msb: u8) -> JanusConfig {
    match msb >> 4 {
        0b0100 => JanusConfig::FourBeam,
        0b0101 => JanusConfig::FiveBeamOneDemod,
        0b1111 => JanusConfig::FiveBeamTwoDemod,
        _ => JanusConfig::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workhorse_600_down_convex() {
        // 0xCB = 1100_1011: вверх, головка, config1, convex, 600 кГц
        // 0x41 = 0100_0001: 4-beam Janus, 20°
        let cfg = SystemConfiguration::decode(&[0xCB, 0x41]);

        assert_eq!(cfg.beam_facing, Some(BeamFacing::Up));
        assert_eq!(cfg.head_attached, Some(true));
        assert_eq!(cfg.sensor_config, Some(SensorConfig::Config1));
        assert_eq!(cfg.beam_pattern, Some(BeamPattern::Convex));
        assert_eq!(cfg.frequency, Some(Frequency::Khz600));
        assert_eq!(cfg.janus_config, Some(JanusConfig::FourBeam));
        assert_eq!(cfg.beam_angle, Some(BeamAngle::Deg20));
    }

    #[test]
    fn test_down_concave_1200() {
        let cfg = SystemConfiguration::decode(&[0b0101_0100, 0b0100_0010]);

        assert_eq!(cfg.beam_facing, Some(BeamFacing::Down));
        assert_eq!(cfg.sensor_config, Some(SensorConfig::Config2));
        assert_eq!(cfg.beam_pattern, Some(BeamPattern::Concave));
        assert_eq!(cfg.frequency, Some(Frequency::Khz1200));
        assert_eq!(cfg.beam_angle, Some(BeamAngle::Deg30));
        assert!(cfg.is_down_looking());
    }

    #[test]
    fn test_unknown_janus_is_sentinel() {
        // 0x2?: комбинация вне таблицы, встречается на реальных приборах
        let cfg = SystemConfiguration::decode(&[0x00, 0x23]);
        assert_eq!(cfg.janus_config, Some(JanusConfig::Unknown));
        assert_eq!(cfg.beam_angle, Some(BeamAngle::Other));
    }

    #[test]
    fn test_undocumented_frequency_and_sensor() {
        let cfg = SystemConfiguration::decode(&[0b0011_0111, 0x40]);
        assert_eq!(cfg.frequency, None);
        assert_eq!(cfg.sensor_config, None);
        assert!(cfg.is_defined());
    }

    #[test]
    fn test_garbage_input_is_undefined() {
        assert!(!SystemConfiguration::decode(&[]).is_defined());
        assert!(!SystemConfiguration::decode(&[0x01]).is_defined());
        assert!(!SystemConfiguration::decode(&[1, 2, 3]).is_defined());
    }
}
