use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
};

use adcp_types::{AdcpError, AdcpResult, FixedLeader, Header, VariableLeader};
use log::{debug, info, warn};

use crate::{
    arrays::{decode_counts, decode_velocity},
    dataset::{CountStatus, DecodeStats, Ensemble, Pd0Data},
    format::{
        pd0_checksum, CHECKSUM_SIZE, HEADER_FIXED_SIZE, MAX_DATA_TYPES, MAX_SYNC_ATTEMPTS,
        PD0_SYNC, SYNC_SEARCH_WINDOW,
    },
    sections::{
        decode_header, decode_section, short_read_to_none, validate_fixed_leader,
        validate_header, SectionMap,
    },
};

/// Раскладка ансамблей в файле, известная после поиска синхро.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsembleLayout {
    /// Смещение первого ансамбля
    pub first_offset: u64,
    /// Шаг между ансамблями (длина + контрольная сумма)
    pub stride: u64,
    /// Число ансамблей (оценка или подтверждённое)
    pub count: usize,
    /// `(ячейки, лучи)` первого ансамбля, если он уже прочитан
    pub dims: Option<(u8, u8)>,
}

/// Последовательный читатель PD0 с произвольным доступом к ансамблям.
///
/// Позиция курсора: внутреннее состояние; для параллельного чтения каждый
/// рабочий открывает собственный читатель через [`Pd0Reader::with_layout`].
pub struct Pd0Reader<R: Read + Seek> {
    reader: BufReader<R>,
    file_size: u64,
    layout: EnsembleLayout,
    status: CountStatus,
    stats: DecodeStats,
    buf: Vec<u8>,
}

impl Pd0Reader<File> {
    /// Открывает файл и находит первый ансамбль.
    pub fn open<P: AsRef<Path>>(path: P) -> AdcpResult<Self> {
        Self::new(File::open(path)?)
    }
}

impl<R: Read + Seek> Pd0Reader<R> {
    /// Создаёт читатель, находя первый валидный ансамбль по синхро-байтам.
    pub fn new(inner: R) -> AdcpResult<Self> {
        let mut reader = BufReader::new(inner);
        let file_size = reader.seek(SeekFrom::End(0))?;
        let (first_offset, header) = find_first_ensemble(&mut reader, file_size)?;
        let stride = header.stride();
        let count = ((file_size - first_offset) / stride) as usize;

        if first_offset > 0 {
            warn!("Skipped {first_offset} bytes before the first ensemble");
        }

        debug!(
            "First ensemble at {first_offset}, stride {stride}, ~{count} ensembles in {file_size} bytes"
        );

        Ok(Self {
            reader,
            file_size,
            layout: EnsembleLayout {
                first_offset,
                stride,
                count,
                dims: None,
            },
            status: CountStatus::Approximate,
            stats: DecodeStats {
                bytes_skipped: first_offset,
                ..DecodeStats::default()
            },
            buf: Vec::with_capacity(stride as usize),
        })
    }

    /// Создаёт читатель с уже найденной раскладкой (без поиска синхро).
    pub fn with_layout(
        inner: R,
        layout: EnsembleLayout,
    ) -> AdcpResult<Self> {
        let mut reader = BufReader::new(inner);
        let file_size = reader.seek(SeekFrom::End(0))?;

        Ok(Self {
            reader,
            file_size,
            layout,
            status: CountStatus::Approximate,
            stats: DecodeStats::default(),
            buf: Vec::with_capacity(layout.stride as usize),
        })
    }

    pub fn layout(&self) -> EnsembleLayout {
        self.layout
    }

    pub fn first_offset(&self) -> u64 {
        self.layout.first_offset
    }

    pub fn stride(&self) -> u64 {
        self.layout.stride
    }

    /// Число ансамблей; до полного прохода: оценка по размеру файла.
    pub fn ensemble_count(&self) -> usize {
        self.layout.count
    }

    pub fn count_status(&self) -> CountStatus {
        self.status
    }

    pub fn is_approximate(&self) -> bool {
        self.status.is_approximate()
    }

    /// Статистика, накопленная читателем.
    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    /// Читает ансамбль `n`. `None`: за концом данных или файл обрезан на `n`;
    /// в последнем случае число ансамблей уменьшается до `n`.
    pub fn read_ensemble(
        &mut self,
        n: usize,
    ) -> AdcpResult<Option<Ensemble>> {
        if n >= self.layout.count {
            return Ok(None);
        }

        let pos = self.layout.first_offset + n as u64 * self.layout.stride;
        self.reader.seek(SeekFrom::Start(pos))?;
        self.buf.resize(self.layout.stride as usize, 0);

        if short_read_to_none(self.reader.read_exact(&mut self.buf))?.is_none() {
            self.truncate(n, "short read");
            return Ok(None);
        }

        match decode_ensemble(&self.buf, n, self.layout.dims)? {
            Decoded::Ok(ens) => {
                if self.layout.dims.is_none() {
                    self.layout.dims = Some((ens.fixed_leader.n_cells, ens.fixed_leader.n_beams));
                }
                if !ens.checksum_ok {
                    self.stats.checksum_failures += 1;
                    warn!("Checksum mismatch in ensemble {n}");
                }
                self.stats.ensembles_ok += 1;
                Ok(Some(*ens))
            }
            Decoded::Corrupt(reason) => {
                self.truncate(n, reason);
                Ok(None)
            }
        }
    }

    /// Полный проход: собирает все ансамбли и подтверждает их число.
    pub fn read_all(&mut self) -> AdcpResult<Pd0Data> {
        let first = self
            .read_ensemble(0)?
            .ok_or_else(|| AdcpError::decode("file holds no complete ensemble"))?;

        let mut data = Pd0Data::new(first, self.layout.first_offset, self.layout.count);
        let mut n = 1;

        while let Some(ens) = self.read_ensemble(n)? {
            data.push(ens);
            n += 1;
        }

        self.finish_pass();
        data.count_status = self.status;
        data.stats = self.stats.clone();
        data.validate_lengths()?;

        info!(
            "Decoded {} ensembles ({} cells x {} beams, native frame {}), status {:?}",
            data.n_ensembles(),
            data.n_cells(),
            data.n_beams(),
            data.native_frame(),
            data.count_status,
        );

        Ok(data)
    }

    /// Фиксирует число ансамблей после прохода по всему файлу.
    pub fn finish_pass(&mut self) {
        if !self.status.is_approximate() {
            return;
        }

        let used = self.layout.count as u64 * self.layout.stride;
        let trailing = self.file_size - self.layout.first_offset - used;
        self.stats.trailing_bytes = trailing;

        if trailing > 0 {
            warn!(
                "{trailing} trailing bytes after ensemble {} ignored (partial ensemble)",
                self.layout.count
            );
            self.status = CountStatus::Truncated {
                at: self.layout.count,
            };
            self.stats.truncated_at = Some(self.layout.count);
        } else {
            self.status = CountStatus::Exact;
        }
    }

    fn truncate(
        &mut self,
        n: usize,
        reason: &str,
    ) {
        warn!(
            "File truncated at ensemble {n} of ~{} ({reason}); keeping {n} ensembles",
            self.layout.count
        );
        self.layout.count = n;
        self.status = CountStatus::Truncated { at: n };
        self.stats.truncated_at = Some(n);
    }
}

/// Исход декодирования буфера одного ансамбля.
pub(crate) enum Decoded {
    Ok(Box<Ensemble>),
    /// Короткое чтение или повреждение: обрезка файла
    Corrupt(&'static str),
}

/// Декодирует полный буфер ансамбля (`stride` байт).
///
/// `dims`: размеры первого ансамбля; ансамбль с другими размерами означает
/// потерю границ и возвращается как ошибка.
pub(crate) fn decode_ensemble(
    buf: &[u8],
    index: usize,
    dims: Option<(u8, u8)>,
) -> AdcpResult<Decoded> {
    let Some(header) = decode_header(buf)? else {
        return Ok(Decoded::Corrupt("short header"));
    };

    if validate_header(&header).is_err() {
        return Ok(Decoded::Corrupt("invalid header"));
    }

    let n_bytes = header.n_bytes as usize;
    if n_bytes + CHECKSUM_SIZE != buf.len() {
        return Ok(Decoded::Corrupt("ensemble length changed"));
    }

    let body = &buf[..n_bytes];
    let stored = u16::from_le_bytes([buf[n_bytes], buf[n_bytes + 1]]);
    let checksum_ok = stored == pd0_checksum(body);

    let map = SectionMap::locate(body, &header);

    let Some(fl_off) = map.fixed_leader else {
        return Ok(Decoded::Corrupt("missing fixed leader"));
    };
    let Some(fixed_leader) = decode_section::<FixedLeader>(body, fl_off)? else {
        return Ok(Decoded::Corrupt("short fixed leader"));
    };

    validate_fixed_leader(&fixed_leader, header.n_bytes)?;

    let (n_cells, n_beams) = (fixed_leader.n_cells, fixed_leader.n_beams);
    if let Some(expected) = dims {
        if expected != (n_cells, n_beams) {
            return Err(AdcpError::decode(format!(
                "ensemble {index}: fixed leader changed from {expected:?} to {:?} cells/beams",
                (n_cells, n_beams)
            )));
        }
    }

    let Some(vl_off) = map.variable_leader else {
        return Ok(Decoded::Corrupt("missing variable leader"));
    };
    let Some(variable_leader) = decode_section::<VariableLeader>(body, vl_off)? else {
        return Ok(Decoded::Corrupt("short variable leader"));
    };

    let (nc, nb) = (n_cells as usize, n_beams as usize);

    let velocity = match map.velocity {
        Some(off) => match decode_velocity(body, off, nc, nb)? {
            Some(v) => v,
            None => return Ok(Decoded::Corrupt("short velocity array")),
        },
        None => vec![adcp_types::BAD_VELOCITY; nc * nb],
    };

    let mut counts = Vec::with_capacity(3);
    for off in [map.correlation, map.echo_intensity, map.percent_good] {
        match off {
            Some(off) => match decode_counts(body, off, nc, nb)? {
                Some(c) => counts.push(c),
                None => return Ok(Decoded::Corrupt("short count array")),
            },
            None => counts.push(vec![0; nc * nb]),
        }
    }
    let percent_good = counts.pop().unwrap_or_default();
    let echo_intensity = counts.pop().unwrap_or_default();
    let correlation = counts.pop().unwrap_or_default();

    let bottom_track = match map.bottom_track {
        Some(off) => match decode_section(body, off)? {
            Some(bt) => Some(bt),
            None => return Ok(Decoded::Corrupt("short bottom track")),
        },
        None => None,
    };

    Ok(Decoded::Ok(Box::new(Ensemble {
        index,
        header,
        fixed_leader,
        variable_leader,
        velocity,
        correlation,
        echo_intensity,
        percent_good,
        bottom_track,
        checksum_ok,
    })))
}

/// Ищет первый ансамбль: синхро-байты, валидный заголовок и синхро на месте
/// следующего ансамбля (если файл достаточно длинный).
fn find_first_ensemble<R: Read + Seek>(
    reader: &mut BufReader<R>,
    file_size: u64,
) -> AdcpResult<(u64, Header)> {
    let window_len = (file_size as usize).min(SYNC_SEARCH_WINDOW);
    let mut window = vec![0u8; window_len];

    reader.seek(SeekFrom::Start(0))?;
    reader.read_exact(&mut window)?;

    let max_header = HEADER_FIXED_SIZE + 2 * MAX_DATA_TYPES as usize;
    let mut attempts = 0;

    for pos in 0..window_len.saturating_sub(1) {
        if window[pos..pos + 2] != PD0_SYNC {
            continue;
        }

        attempts += 1;
        if attempts > MAX_SYNC_ATTEMPTS {
            break;
        }

        let header_bytes = if pos + max_header <= window_len || window_len as u64 == file_size {
            window[pos..(pos + max_header).min(window_len)].to_vec()
        } else {
            read_at(reader, pos as u64, max_header, file_size)?
        };

        let Some(header) = decode_header(&header_bytes)? else {
            continue;
        };

        if let Err(e) = validate_header(&header) {
            debug!("Sync candidate at {pos} rejected: {e}");
            continue;
        }

        let next = pos as u64 + header.stride();
        if next + 2 <= file_size && read_at(reader, next, 2, file_size)? != PD0_SYNC {
            debug!("Sync candidate at {pos} rejected: no sync at next ensemble ({next})");
            continue;
        }

        return Ok((pos as u64, header));
    }

    Err(AdcpError::decode(format!(
        "no valid ensemble header found ({attempts} sync candidates examined)"
    )))
}

fn read_at<R: Read + Seek>(
    reader: &mut BufReader<R>,
    pos: u64,
    len: usize,
    file_size: u64,
) -> AdcpResult<Vec<u8>> {
    let len = len.min(file_size.saturating_sub(pos) as usize);
    let mut buf = vec![0u8; len];

    reader.seek(SeekFrom::Start(pos))?;
    reader.read_exact(&mut buf)?;

    Ok(buf)
}
