//! Декодирование секций фиксированной структуры: заголовок, фиксированный и
//! переменный лидеры, донный трекинг.
//!
//! Короткое чтение внутри секции: не ошибка, а признак усечённого или
//! повреждённого ансамбля: функции возвращают `Ok(None)`.

use std::io::{self, Cursor, Read};

use adcp_types::{
    AdcpError, AdcpResult, BottomTrack, CoordinateTransform, FixedLeader, Header,
    SystemConfiguration, VariableLeader,
};
use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::{
    binary::{decode_record, FieldDef, Record},
    format::{
        SectionKind, BOTTOM_TRACK_FIELDS, FIXED_LEADER_FIELDS, HEADER_FIELDS, HEADER_FIXED_SIZE,
        MAX_BEAMS, MAX_DATA_TYPES, PD0_SYNC, SECTION_ID_SIZE, VARIABLE_LEADER_FIELDS,
    },
    system_config::SystemConfigurationExt,
};

/// Секция, собираемая из таблицы полей.
pub trait FromRecord: Sized {
    const FIELDS: &'static [FieldDef];

    fn from_record(rec: &Record) -> AdcpResult<Self>;
}

/// Позиции секций внутри ансамбля.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionMap {
    pub fixed_leader: Option<usize>,
    pub variable_leader: Option<usize>,
    pub velocity: Option<usize>,
    pub correlation: Option<usize>,
    pub echo_intensity: Option<usize>,
    pub percent_good: Option<usize>,
    pub bottom_track: Option<usize>,
}

/// Переводит короткое чтение в `None`; прочие ошибки ввода/вывода остаются ошибками.
pub(crate) fn short_read_to_none<T>(res: io::Result<T>) -> AdcpResult<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(AdcpError::Io(e)),
    }
}

/// Декодирует заголовок, начиная с байта синхро.
pub fn decode_header(buf: &[u8]) -> AdcpResult<Option<Header>> {
    let mut cur = Cursor::new(buf);

    let rec = match short_read_to_none(decode_record(&mut cur, HEADER_FIELDS))? {
        Some(r) => r,
        None => return Ok(None),
    };

    let n_data_types = rec.u8("n_data_types")?;
    let mut offsets = Vec::with_capacity(n_data_types as usize);

    for _ in 0..n_data_types {
        match short_read_to_none(cur.read_u16::<LittleEndian>())? {
            Some(off) => offsets.push(off),
            None => return Ok(None),
        }
    }

    Ok(Some(Header {
        header_id: rec.u8("header_id")?,
        source_id: rec.u8("source_id")?,
        n_bytes: rec.u16("n_bytes")?,
        spare: rec.u8("spare")?,
        n_data_types,
        offsets,
    }))
}

/// Проверяет, что заголовок структурно возможен.
pub fn validate_header(h: &Header) -> AdcpResult<()> {
    if [h.header_id, h.source_id] != PD0_SYNC {
        return Err(AdcpError::decode(format!(
            "bad sync bytes {:02X}{:02X}",
            h.header_id, h.source_id
        )));
    }

    if h.n_data_types == 0 || h.n_data_types > MAX_DATA_TYPES {
        return Err(AdcpError::decode(format!(
            "implausible data type count {}",
            h.n_data_types
        )));
    }

    let header_len = HEADER_FIXED_SIZE + 2 * h.n_data_types as usize;
    if (h.n_bytes as usize) < header_len {
        return Err(AdcpError::decode(format!(
            "ensemble length {} shorter than its header ({header_len})",
            h.n_bytes
        )));
    }

    for &off in &h.offsets {
        let off = off as usize;
        if off < header_len || off + SECTION_ID_SIZE > h.n_bytes as usize {
            return Err(AdcpError::decode(format!(
                "section offset {off} outside ensemble of {} bytes",
                h.n_bytes
            )));
        }
    }

    Ok(())
}

impl SectionMap {
    /// Определяет секции по их ID; неизвестный ID трактуется по позиции.
    pub fn locate(
        body: &[u8],
        header: &Header,
    ) -> Self {
        let mut map = SectionMap::default();

        for (i, &off) in header.offsets.iter().enumerate() {
            let off = off as usize;
            let kind = body
                .get(off..off + SECTION_ID_SIZE)
                .and_then(|b| SectionKind::from_id(u16::from_le_bytes([b[0], b[1]])))
                .or_else(|| SectionKind::from_position(i));

            let slot = match kind {
                Some(SectionKind::FixedLeader) => &mut map.fixed_leader,
                Some(SectionKind::VariableLeader) => &mut map.variable_leader,
                Some(SectionKind::Velocity) => &mut map.velocity,
                Some(SectionKind::Correlation) => &mut map.correlation,
                Some(SectionKind::EchoIntensity) => &mut map.echo_intensity,
                Some(SectionKind::PercentGood) => &mut map.percent_good,
                Some(SectionKind::BottomTrack) => &mut map.bottom_track,
                Some(SectionKind::Status) | None => {
                    debug!("skipping section #{i} at offset {off}");
                    continue;
                }
            };
            slot.get_or_insert(off);
        }

        // Донный трекинг признаётся только при 7+ объявленных секциях
        if !header.declares_bottom_track() {
            map.bottom_track = None;
        }

        map
    }
}

/// Декодирует секцию `T` по смещению `offset` тела ансамбля.
pub fn decode_section<T: FromRecord>(
    body: &[u8],
    offset: usize,
) -> AdcpResult<Option<T>> {
    let Some(section) = body.get(offset..) else {
        return Ok(None);
    };

    let mut cur = Cursor::new(section);
    match short_read_to_none(decode_record(&mut cur, T::FIELDS))? {
        Some(rec) => T::from_record(&rec).map(Some),
        None => Ok(None),
    }
}

/// Проверяет размеры массивов, заявленные фиксированным лидером.
///
/// Ошибка здесь означает, что чтение потеряло границы ансамблей.
pub fn validate_fixed_leader(
    fl: &FixedLeader,
    n_bytes: u16,
) -> AdcpResult<()> {
    if fl.n_beams == 0 || fl.n_beams > MAX_BEAMS {
        return Err(AdcpError::decode(format!(
            "implausible beam count {}",
            fl.n_beams
        )));
    }

    if fl.n_cells == 0 {
        return Err(AdcpError::decode("fixed leader declares zero cells"));
    }

    let velocity_bytes = fl.n_cells as usize * fl.n_beams as usize * 2 + SECTION_ID_SIZE;
    if velocity_bytes > n_bytes as usize {
        return Err(AdcpError::decode(format!(
            "{} cells x {} beams needs {velocity_bytes} bytes, ensemble holds {n_bytes}",
            fl.n_cells, fl.n_beams
        )));
    }

    Ok(())
}

impl FromRecord for FixedLeader {
    const FIELDS: &'static [FieldDef] = FIXED_LEADER_FIELDS;

    fn from_record(rec: &Record) -> AdcpResult<Self> {
        let raw_cfg = rec.bytes("system_configuration")?;
        let mut cpu_board_serial = Vec::new();
        cpu_board_serial.extend_from_slice(rec.bytes("cpu_board_serial")?);

        Ok(FixedLeader {
            cpu_fw_version: rec.u8("cpu_fw_version")?,
            cpu_fw_revision: rec.u8("cpu_fw_revision")?,
            system_configuration: SystemConfiguration::decode(raw_cfg),
            system_configuration_raw: [raw_cfg[0], raw_cfg[1]],
            real_sim_flag: rec.u8("real_sim_flag")?,
            lag_length: rec.u8("lag_length")?,
            n_beams: rec.u8("n_beams")?,
            n_cells: rec.u8("n_cells")?,
            pings_per_ensemble: rec.u16("pings_per_ensemble")?,
            cell_length_cm: rec.u16("cell_length")?,
            blank_after_transmit_cm: rec.u16("blank_after_transmit")?,
            profiling_mode: rec.u8("profiling_mode")?,
            low_correlation_threshold: rec.u8("low_correlation_threshold")?,
            n_code_repetitions: rec.u8("n_code_repetitions")?,
            percent_good_min: rec.u8("percent_good_min")?,
            error_velocity_max: rec.u16("error_velocity_max")?,
            tpp_minutes: rec.u8("tpp_minutes")?,
            tpp_seconds: rec.u8("tpp_seconds")?,
            tpp_hundredths: rec.u8("tpp_hundredths")?,
            coordinate_transform: CoordinateTransform::from_byte(rec.u8("coordinate_transform")?),
            heading_alignment: rec.i16("heading_alignment")?,
            heading_bias: rec.i16("heading_bias")?,
            sensor_source: rec.u8("sensor_source")?,
            sensors_available: rec.u8("sensors_available")?,
            bin1_distance_cm: rec.u16("bin1_distance")?,
            transmit_pulse_length_cm: rec.u16("transmit_pulse_length")?,
            ref_layer_start: rec.u8("ref_layer_start")?,
            ref_layer_end: rec.u8("ref_layer_end")?,
            false_target_threshold: rec.u8("false_target_threshold")?,
            spare: rec.u8("spare")?,
            transmit_lag_distance_cm: rec.u16("transmit_lag_distance")?,
            cpu_board_serial,
            system_bandwidth: rec.u16("system_bandwidth")?,
            system_power: rec.u8("system_power")?,
            spare2: rec.u8("spare2")?,
            instrument_serial: rec.u32("instrument_serial")?,
            beam_angle: rec.u8("beam_angle")?,
        })
    }
}

impl FromRecord for VariableLeader {
    const FIELDS: &'static [FieldDef] = VARIABLE_LEADER_FIELDS;

    fn from_record(rec: &Record) -> AdcpResult<Self> {
        let mut adc_channels = [0u8; 8];
        let adc = rec.bytes("adc_channels")?;
        adc_channels.copy_from_slice(&adc[..8]);

        Ok(VariableLeader {
            ensemble_number: rec.u16("ensemble_number")?,
            rtc_year: rec.u8("rtc_year")?,
            rtc_month: rec.u8("rtc_month")?,
            rtc_day: rec.u8("rtc_day")?,
            rtc_hour: rec.u8("rtc_hour")?,
            rtc_minute: rec.u8("rtc_minute")?,
            rtc_second: rec.u8("rtc_second")?,
            rtc_hundredths: rec.u8("rtc_hundredths")?,
            ensemble_number_msb: rec.u8("ensemble_number_msb")?,
            bit_result: rec.u16("bit_result")?,
            speed_of_sound: rec.u16("speed_of_sound")?,
            depth_of_transducer: rec.u16("depth_of_transducer")?,
            heading: rec.u16("heading")?,
            pitch: rec.i16("pitch")?,
            roll: rec.i16("roll")?,
            salinity: rec.u16("salinity")?,
            temperature: rec.i16("temperature")?,
            mpt_minutes: rec.u8("mpt_minutes")?,
            mpt_seconds: rec.u8("mpt_seconds")?,
            mpt_hundredths: rec.u8("mpt_hundredths")?,
            heading_std: rec.u8("heading_std")?,
            pitch_std: rec.u8("pitch_std")?,
            roll_std: rec.u8("roll_std")?,
            adc_channels,
            error_status_word: rec.u32("error_status_word")?,
            reserved: rec.u16("reserved")?,
            pressure: rec.u32("pressure")?,
            pressure_variance: rec.u32("pressure_variance")?,
            spare: rec.u8("spare")?,
            y2k_century: rec.u8("y2k_century")?,
            y2k_year: rec.u8("y2k_year")?,
            y2k_month: rec.u8("y2k_month")?,
            y2k_day: rec.u8("y2k_day")?,
            y2k_hour: rec.u8("y2k_hour")?,
            y2k_minute: rec.u8("y2k_minute")?,
            y2k_second: rec.u8("y2k_second")?,
            y2k_hundredths: rec.u8("y2k_hundredths")?,
        })
    }
}

impl FromRecord for BottomTrack {
    const FIELDS: &'static [FieldDef] = BOTTOM_TRACK_FIELDS;

    fn from_record(rec: &Record) -> AdcpResult<Self> {
        Ok(BottomTrack {
            pings_per_ensemble: rec.u16("pings_per_ensemble")?,
            delay_before_reacquire: rec.u16("delay_before_reacquire")?,
            correlation_min: rec.u8("correlation_min")?,
            evaluation_amplitude_min: rec.u8("evaluation_amplitude_min")?,
            percent_good_min: rec.u8("percent_good_min")?,
            mode: rec.u8("mode")?,
            error_velocity_max: rec.u16("error_velocity_max")?,
            reserved: rec.u32("reserved")?,
            range_lsb: rec.beams("range", Record::u16)?,
            velocity: rec.beams("velocity", Record::i16)?,
            correlation: rec.beams("correlation", Record::u8)?,
            evaluation_amplitude: rec.beams("evaluation_amplitude", Record::u8)?,
            percent_good: rec.beams("percent_good", Record::u8)?,
            ref_layer_min: rec.u16("ref_layer_min")?,
            ref_layer_near: rec.u16("ref_layer_near")?,
            ref_layer_far: rec.u16("ref_layer_far")?,
            ref_layer_velocity: rec.beams("ref_velocity", Record::i16)?,
            ref_layer_correlation: rec.beams("ref_correlation", Record::u8)?,
            ref_layer_intensity: rec.beams("ref_intensity", Record::u8)?,
            ref_layer_percent_good: rec.beams("ref_percent_good", Record::u8)?,
            max_depth: rec.u16("max_depth")?,
            rssi_amplitude: rec.beams("rssi_amplitude", Record::u8)?,
            gain: rec.u8("gain")?,
            range_msb: rec.beams("range_msb", Record::u8)?,
        })
    }
}

/// Читает ID секции по смещению (для диагностики).
pub fn section_id(
    body: &[u8],
    offset: usize,
) -> Option<u16> {
    let mut cur = Cursor::new(body.get(offset..)?);
    let mut id = [0u8; 2];
    cur.read_exact(&mut id).ok()?;
    Some(u16::from_le_bytes(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(
        n_bytes: u16,
        offsets: &[u16],
    ) -> Vec<u8> {
        let mut buf = vec![0x7F, 0x7F];
        buf.extend_from_slice(&n_bytes.to_le_bytes());
        buf.push(0);
        buf.push(offsets.len() as u8);
        for off in offsets {
            buf.extend_from_slice(&off.to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_decode_and_validate_header() {
        let buf = header_bytes(400, &[18, 77, 142]);
        let h = decode_header(&buf).unwrap().unwrap();

        assert_eq!(h.n_bytes, 400);
        assert_eq!(h.n_data_types, 3);
        assert_eq!(h.offsets, vec![18, 77, 142]);
        validate_header(&h).unwrap();
    }

    #[test]
    fn test_header_short_read_is_none() {
        let buf = header_bytes(400, &[18, 77, 142]);
        assert!(decode_header(&buf[..9]).unwrap().is_none());
        assert!(decode_header(&buf[..3]).unwrap().is_none());
    }

    #[test]
    fn test_validate_rejects_bad_offsets() {
        let h = decode_header(&header_bytes(100, &[12, 500])).unwrap().unwrap();
        assert!(validate_header(&h).is_err());

        let h = decode_header(&header_bytes(100, &[2])).unwrap().unwrap();
        assert!(validate_header(&h).is_err(), "смещение внутри заголовка");

        let mut raw = header_bytes(100, &[8]);
        raw[1] = 0x00;
        let h = decode_header(&raw).unwrap().unwrap();
        assert!(validate_header(&h).is_err(), "неверный синхро-байт");
    }

    #[test]
    fn test_locate_by_id_and_position() {
        // Секции в нестандартном порядке: VL, FL, неизвестный ID
        let mut body = header_bytes(60, &[12, 30, 40]);
        body.resize(60, 0);
        body[12..14].copy_from_slice(&0x0080u16.to_le_bytes());
        body[30..32].copy_from_slice(&0x0000u16.to_le_bytes());
        body[40..42].copy_from_slice(&0xBEEFu16.to_le_bytes());

        let h = decode_header(&body).unwrap().unwrap();
        let map = SectionMap::locate(&body, &h);

        assert_eq!(map.variable_leader, Some(12));
        assert_eq!(map.fixed_leader, Some(30));
        // Неизвестный ID на позиции 2: скорость по стандартному порядку
        assert_eq!(map.velocity, Some(40));
        assert_eq!(map.bottom_track, None);
        assert_eq!(section_id(&body, 12), Some(0x0080));
    }

    #[test]
    fn test_validate_fixed_leader_dims() {
        let mut fl = FixedLeader {
            n_beams: 4,
            n_cells: 20,
            ..FixedLeader::default()
        };
        validate_fixed_leader(&fl, 1000).unwrap();
        assert!(validate_fixed_leader(&fl, 100).is_err());

        fl.n_beams = 0;
        assert!(validate_fixed_leader(&fl, 1000).is_err());

        fl.n_beams = 200;
        assert!(validate_fixed_leader(&fl, 1000).is_err());

        fl.n_beams = 4;
        fl.n_cells = 0;
        assert!(validate_fixed_leader(&fl, 1000).is_err());
    }

    #[test]
    fn test_decode_section_short() {
        let body = vec![0u8; 30];
        let fl: Option<FixedLeader> = decode_section(&body, 0).unwrap();
        assert!(fl.is_none());

        let fl: Option<FixedLeader> = decode_section(&body, 100).unwrap();
        assert!(fl.is_none(), "смещение за концом тела");
    }
}
