//! Массивы `ячейка × луч` одного ансамбля.
//!
//! Порядок в файле: ячейка меняется медленнее луча, как и в [`adcp_types::Array3`].

use std::io::Cursor;

use adcp_types::AdcpResult;
use byteorder::{LittleEndian, ReadBytesExt};

use crate::{format::SECTION_ID_SIZE, sections::short_read_to_none};

/// Скорости (мм/с, знаковые) по ячейкам и лучам.
pub fn decode_velocity(
    body: &[u8],
    offset: usize,
    n_cells: usize,
    n_beams: usize,
) -> AdcpResult<Option<Vec<i16>>> {
    let Some(data) = body.get(offset + SECTION_ID_SIZE..) else {
        return Ok(None);
    };

    let mut cur = Cursor::new(data);
    let mut out = Vec::with_capacity(n_cells * n_beams);

    for _ in 0..n_cells * n_beams {
        match short_read_to_none(cur.read_i16::<LittleEndian>())? {
            Some(v) => out.push(v),
            None => return Ok(None),
        }
    }

    Ok(Some(out))
}

/// Беззнаковые отсчёты (корреляция, интенсивность эха, процент годных).
pub fn decode_counts(
    body: &[u8],
    offset: usize,
    n_cells: usize,
    n_beams: usize,
) -> AdcpResult<Option<Vec<u8>>> {
    let start = offset + SECTION_ID_SIZE;
    let end = start + n_cells * n_beams;

    Ok(body.get(start..end).map(<[u8]>::to_vec))
}
