//! Генератор синтетических PD0-файлов для тестов и бенчмарков.
//!
//! Раскладка ансамбля: заголовок, фиксированный лидер, переменный лидер,
//! скорость, корреляция, интенсивность эха, процент годных и (опционально)
//! донный трекинг.

use std::{fs::File, io::Write, path::Path};

use adcp_types::AdcpResult;
use byteorder::{LittleEndian, WriteBytesExt};

use crate::{
    binary::table_width,
    format::{
        pd0_checksum, SectionKind, BOTTOM_TRACK_FIELDS, FIXED_LEADER_FIELDS, HEADER_FIXED_SIZE,
        PD0_SYNC, VARIABLE_LEADER_FIELDS,
    },
};

type CellFn<T> = Box<dyn Fn(usize, usize, usize) -> T + Send + Sync>;
type AttitudeFn = Box<dyn Fn(usize) -> (u16, i16, i16) + Send + Sync>;

/// Параметры синтетического файла.
pub struct Pd0Builder {
    pub n_beams: u8,
    pub n_cells: u8,
    pub cell_length_cm: u16,
    pub bin1_distance_cm: u16,
    pub transmit_pulse_length_cm: u16,
    /// Слово конфигурации (LSB, MSB)
    pub system_configuration: [u8; 2],
    pub coordinate_transform: u8,
    pub system_bandwidth: u16,
    pub beam_angle: u8,
    pub heading_bias: i16,
    pub salinity: u16,
    /// Сотые °C
    pub temperature: i16,
    /// Дециметры
    pub depth_of_transducer: u16,
    /// Наклонные дальности донного трекинга, см; `None`: без секции
    pub bottom_track_cm: Option<[u32; 4]>,
    /// Скорости донного трекинга, мм/с
    pub bottom_track_velocity: [i16; 4],
    /// Байты перед первым ансамблем
    pub leading_garbage: Vec<u8>,
    velocity: CellFn<i16>,
    correlation: CellFn<u8>,
    echo: CellFn<u8>,
    attitude: AttitudeFn,
}

impl Default for Pd0Builder {
    fn default() -> Self {
        Self {
            n_beams: 4,
            n_cells: 20,
            cell_length_cm: 50,
            bin1_distance_cm: 150,
            transmit_pulse_length_cm: 60,
            // вниз, головка, config1, convex, 600 кГц / 4-beam Janus, 20°
            system_configuration: [0b0100_1011, 0b0100_0001],
            coordinate_transform: 0,
            system_bandwidth: 0,
            beam_angle: 20,
            heading_bias: 0,
            salinity: 35,
            temperature: 1000,
            depth_of_transducer: 5,
            bottom_track_cm: None,
            bottom_track_velocity: [0; 4],
            leading_garbage: Vec::new(),
            velocity: Box::new(|e, c, b| ((e * 7 + c * 3 + b) % 500) as i16 - 250),
            correlation: Box::new(|_, _, _| 120),
            echo: Box::new(|_, c, _| 200u8.saturating_sub((c as u8).saturating_mul(4))),
            attitude: Box::new(|_| (0, 0, 0)),
        }
    }
}

impl Pd0Builder {
    pub fn new(
        n_cells: u8,
        n_beams: u8,
    ) -> Self {
        Self {
            n_cells,
            n_beams,
            ..Self::default()
        }
    }

    pub fn with_velocity<F>(
        mut self,
        f: F,
    ) -> Self
    where
        F: Fn(usize, usize, usize) -> i16 + Send + Sync + 'static,
    {
        self.velocity = Box::new(f);
        self
    }

    pub fn with_correlation<F>(
        mut self,
        f: F,
    ) -> Self
    where
        F: Fn(usize, usize, usize) -> u8 + Send + Sync + 'static,
    {
        self.correlation = Box::new(f);
        self
    }

    pub fn with_echo<F>(
        mut self,
        f: F,
    ) -> Self
    where
        F: Fn(usize, usize, usize) -> u8 + Send + Sync + 'static,
    {
        self.echo = Box::new(f);
        self
    }

    /// Ориентация по ансамблю: (курс, тангаж, крен) в сотых градуса.
    pub fn with_attitude<F>(
        mut self,
        f: F,
    ) -> Self
    where
        F: Fn(usize) -> (u16, i16, i16) + Send + Sync + 'static,
    {
        self.attitude = Box::new(f);
        self
    }

    pub fn with_bottom_track(
        mut self,
        range_cm: [u32; 4],
    ) -> Self {
        self.bottom_track_cm = Some(range_cm);
        self
    }

    /// Код системы координат (0 beam .. 3 earth) в байте преобразования.
    pub fn with_frame(
        mut self,
        frame: u8,
    ) -> Self {
        self.coordinate_transform = (frame & 0b11) << 3;
        self
    }

    fn n_data_types(&self) -> usize {
        if self.bottom_track_cm.is_some() {
            7
        } else {
            6
        }
    }

    fn section_sizes(&self) -> Vec<(SectionKind, usize)> {
        let cells = self.n_cells as usize * self.n_beams as usize;
        let mut sizes = vec![
            (SectionKind::FixedLeader, table_width(FIXED_LEADER_FIELDS)),
            (SectionKind::VariableLeader, table_width(VARIABLE_LEADER_FIELDS)),
            (SectionKind::Velocity, 2 + 2 * cells),
            (SectionKind::Correlation, 2 + cells),
            (SectionKind::EchoIntensity, 2 + cells),
            (SectionKind::PercentGood, 2 + cells),
        ];

        if self.bottom_track_cm.is_some() {
            sizes.push((SectionKind::BottomTrack, table_width(BOTTOM_TRACK_FIELDS)));
        }

        sizes
    }

    /// Длина ансамбля без контрольной суммы.
    pub fn ensemble_len(&self) -> usize {
        HEADER_FIXED_SIZE
            + 2 * self.n_data_types()
            + self.section_sizes().iter().map(|(_, s)| s).sum::<usize>()
    }

    /// Шаг между ансамблями в файле.
    pub fn stride(&self) -> usize {
        self.ensemble_len() + 2
    }

    /// Байты одного ансамбля с контрольной суммой.
    pub fn ensemble_bytes(
        &self,
        index: usize,
    ) -> AdcpResult<Vec<u8>> {
        let n_bytes = self.ensemble_len();
        let mut buf = Vec::with_capacity(n_bytes + 2);

        buf.write_all(&PD0_SYNC)?;
        buf.write_u16::<LittleEndian>(n_bytes as u16)?;
        buf.write_u8(0)?;
        buf.write_u8(self.n_data_types() as u8)?;

        let mut offset = HEADER_FIXED_SIZE + 2 * self.n_data_types();
        for (_, size) in self.section_sizes() {
            buf.write_u16::<LittleEndian>(offset as u16)?;
            offset += size;
        }

        self.write_fixed_leader(&mut buf)?;
        self.write_variable_leader(&mut buf, index)?;

        let (nc, nb) = (self.n_cells as usize, self.n_beams as usize);

        buf.write_u16::<LittleEndian>(SectionKind::Velocity.id())?;
        for c in 0..nc {
            for b in 0..nb {
                buf.write_i16::<LittleEndian>((self.velocity)(index, c, b))?;
            }
        }

        for (kind, f) in [
            (SectionKind::Correlation, &self.correlation),
            (SectionKind::EchoIntensity, &self.echo),
        ] {
            buf.write_u16::<LittleEndian>(kind.id())?;
            for c in 0..nc {
                for b in 0..nb {
                    buf.write_u8(f(index, c, b))?;
                }
            }
        }

        buf.write_u16::<LittleEndian>(SectionKind::PercentGood.id())?;
        buf.extend(std::iter::repeat(100u8).take(nc * nb));

        if let Some(range) = self.bottom_track_cm {
            self.write_bottom_track(&mut buf, range)?;
        }

        debug_assert_eq!(buf.len(), n_bytes);
        let checksum = pd0_checksum(&buf);
        buf.write_u16::<LittleEndian>(checksum)?;

        Ok(buf)
    }

    /// Полный файл из `n` ансамблей.
    pub fn build(
        &self,
        n: usize,
    ) -> AdcpResult<Vec<u8>> {
        let mut out = self.leading_garbage.clone();
        out.reserve(n * self.stride());

        for i in 0..n {
            out.extend(self.ensemble_bytes(i)?);
        }

        Ok(out)
    }

    /// Записывает файл из `n` ансамблей.
    pub fn write_to<P: AsRef<Path>>(
        &self,
        path: P,
        n: usize,
    ) -> AdcpResult<()> {
        let mut file = File::create(path)?;
        file.write_all(&self.build(n)?)?;
        Ok(())
    }

    fn write_fixed_leader(
        &self,
        buf: &mut Vec<u8>,
    ) -> AdcpResult<()> {
        buf.write_u16::<LittleEndian>(SectionKind::FixedLeader.id())?;
        buf.write_u8(51)?; // версия прошивки
        buf.write_u8(41)?;
        buf.write_all(&self.system_configuration)?;
        buf.write_u8(0)?; // real/sim
        buf.write_u8(7)?; // lag length
        buf.write_u8(self.n_beams)?;
        buf.write_u8(self.n_cells)?;
        buf.write_u16::<LittleEndian>(60)?; // pings
        buf.write_u16::<LittleEndian>(self.cell_length_cm)?;
        buf.write_u16::<LittleEndian>(88)?; // blank
        buf.write_u8(1)?; // profiling mode
        buf.write_u8(64)?; // low correlation threshold
        buf.write_u8(5)?;
        buf.write_u8(0)?; // percent good min
        buf.write_u16::<LittleEndian>(2000)?;
        buf.write_all(&[0, 1, 0])?; // tpp
        buf.write_u8(self.coordinate_transform)?;
        buf.write_i16::<LittleEndian>(0)?; // heading alignment
        buf.write_i16::<LittleEndian>(self.heading_bias)?;
        buf.write_u8(0x7D)?;
        buf.write_u8(0x3D)?;
        buf.write_u16::<LittleEndian>(self.bin1_distance_cm)?;
        buf.write_u16::<LittleEndian>(self.transmit_pulse_length_cm)?;
        buf.write_u8(1)?;
        buf.write_u8(5)?;
        buf.write_u8(50)?; // false target
        buf.write_u8(0)?;
        buf.write_u16::<LittleEndian>(49)?;
        buf.write_all(&[0x9E, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00])?;
        buf.write_u16::<LittleEndian>(self.system_bandwidth)?;
        buf.write_u8(255)?; // power
        buf.write_u8(0)?;
        buf.write_u32::<LittleEndian>(12345)?;
        buf.write_u8(self.beam_angle)?;
        Ok(())
    }

    fn write_variable_leader(
        &self,
        buf: &mut Vec<u8>,
        index: usize,
    ) -> AdcpResult<()> {
        let number = index + 1;
        let (heading, pitch, roll) = (self.attitude)(index);
        let (minute, second) = ((index / 60) as u8 % 60, (index % 60) as u8);

        buf.write_u16::<LittleEndian>(SectionKind::VariableLeader.id())?;
        buf.write_u16::<LittleEndian>(number as u16)?;
        buf.write_all(&[24, 5, 1, 12, minute, second, 0])?;
        buf.write_u8((number >> 16) as u8)?;
        buf.write_u16::<LittleEndian>(0)?; // BIT
        buf.write_u16::<LittleEndian>(1500)?;
        buf.write_u16::<LittleEndian>(self.depth_of_transducer)?;
        buf.write_u16::<LittleEndian>(heading)?;
        buf.write_i16::<LittleEndian>(pitch)?;
        buf.write_i16::<LittleEndian>(roll)?;
        buf.write_u16::<LittleEndian>(self.salinity)?;
        buf.write_i16::<LittleEndian>(self.temperature)?;
        buf.write_all(&[0, 0, 0])?; // mpt
        buf.write_all(&[0, 0, 0])?; // std
        buf.write_all(&[0; 8])?; // ADC
        buf.write_u32::<LittleEndian>(0)?;
        buf.write_u16::<LittleEndian>(0)?;
        buf.write_u32::<LittleEndian>(5_000)?; // 5 дбар
        buf.write_u32::<LittleEndian>(0)?;
        buf.write_u8(0)?;
        buf.write_all(&[20, 24, 5, 1, 12, minute, second, 0])?;
        Ok(())
    }

    fn write_bottom_track(
        &self,
        buf: &mut Vec<u8>,
        range_cm: [u32; 4],
    ) -> AdcpResult<()> {
        buf.write_u16::<LittleEndian>(SectionKind::BottomTrack.id())?;
        buf.write_u16::<LittleEndian>(1)?;
        buf.write_u16::<LittleEndian>(0)?;
        buf.write_all(&[220, 30, 0, 5])?;
        buf.write_u16::<LittleEndian>(1000)?;
        buf.write_u32::<LittleEndian>(0)?;

        for r in range_cm {
            buf.write_u16::<LittleEndian>((r & 0xFFFF) as u16)?;
        }
        for v in self.bottom_track_velocity {
            buf.write_i16::<LittleEndian>(v)?;
        }
        buf.write_all(&[250; 4])?; // correlation
        buf.write_all(&[80; 4])?; // evaluation amplitude
        buf.write_all(&[100; 4])?; // percent good
        buf.write_u16::<LittleEndian>(20)?;
        buf.write_u16::<LittleEndian>(80)?;
        buf.write_u16::<LittleEndian>(160)?;
        for _ in 0..4 {
            buf.write_i16::<LittleEndian>(0)?;
        }
        buf.write_all(&[0; 12])?; // ref layer correlation/intensity/pg
        buf.write_u16::<LittleEndian>(0)?;
        buf.write_all(&[150; 4])?; // RSSI
        buf.write_u8(1)?;
        for r in range_cm {
            buf.write_u8((r >> 16) as u8)?;
        }
        Ok(())
    }
}
