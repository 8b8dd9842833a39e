//! Чтение одного типизированного поля из байтового курсора.
//!
//! Все секции PD0 описываются таблицами [`FieldDef`]; одна универсальная
//! функция [`decode_record`] проходит таблицу и собирает [`Record`].
//! Добавить поле = добавить строку в таблицу.

use std::io::{self, Read};

use adcp_types::{AdcpError, AdcpResult};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

/// Порядок байт поля
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Тип поля и его ширина
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
    /// Сырые байты заданной длины
    Bytes(usize),
}

/// Описание одного поля секции.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub endian: Endian,
    /// `false`: поле отдаётся вызывающему коду нераскодированным
    pub decode: bool,
}

/// Значение поля после декодирования.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Raw(Vec<u8>),
}

/// Упорядоченный набор именованных полей одной секции.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: Vec<(&'static str, FieldValue)>,
}

impl FieldKind {
    pub const fn width(&self) -> usize {
        match self {
            FieldKind::U8 | FieldKind::I8 => 1,
            FieldKind::U16 | FieldKind::I16 => 2,
            FieldKind::U32 | FieldKind::I32 | FieldKind::F32 => 4,
            FieldKind::F64 => 8,
            FieldKind::Bytes(n) => *n,
        }
    }

    /// Символ формата в нотации `struct`.
    pub const fn format_char(&self) -> char {
        match self {
            FieldKind::U8 => 'B',
            FieldKind::I8 => 'b',
            FieldKind::U16 => 'H',
            FieldKind::I16 => 'h',
            FieldKind::U32 => 'I',
            FieldKind::I32 => 'i',
            FieldKind::F32 => 'f',
            FieldKind::F64 => 'd',
            FieldKind::Bytes(_) => 's',
        }
    }
}

impl FieldDef {
    /// Декодируемое little-endian поле.
    pub const fn le(
        name: &'static str,
        kind: FieldKind,
    ) -> Self {
        Self {
            name,
            kind,
            endian: Endian::Little,
            decode: true,
        }
    }

    /// Декодируемое big-endian поле.
    pub const fn be(
        name: &'static str,
        kind: FieldKind,
    ) -> Self {
        Self {
            name,
            kind,
            endian: Endian::Big,
            decode: true,
        }
    }

    /// Сырые байты без декодирования.
    pub const fn raw(
        name: &'static str,
        width: usize,
    ) -> Self {
        Self {
            name,
            kind: FieldKind::Bytes(width),
            endian: Endian::Little,
            decode: false,
        }
    }

    pub const fn width(&self) -> usize {
        self.kind.width()
    }
}

/// Суммарная ширина таблицы в байтах.
pub const fn table_width(table: &[FieldDef]) -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < table.len() {
        total += table[i].kind.width();
        i += 1;
    }
    total
}

/// Читает одно поле. Короткое чтение возвращается как
/// [`io::ErrorKind::UnexpectedEof`].
pub fn read_field<R: Read>(
    r: &mut R,
    def: &FieldDef,
) -> io::Result<FieldValue> {
    if !def.decode {
        let mut buf = vec![0u8; def.width()];
        r.read_exact(&mut buf)?;
        return Ok(FieldValue::Raw(buf));
    }

    let value = match (def.kind, def.endian) {
        (FieldKind::U8, _) => FieldValue::Int(r.read_u8()? as i64),
        (FieldKind::I8, _) => FieldValue::Int(r.read_i8()? as i64),
        (FieldKind::U16, Endian::Little) => FieldValue::Int(r.read_u16::<LittleEndian>()? as i64),
        (FieldKind::U16, Endian::Big) => FieldValue::Int(r.read_u16::<BigEndian>()? as i64),
        (FieldKind::I16, Endian::Little) => FieldValue::Int(r.read_i16::<LittleEndian>()? as i64),
        (FieldKind::I16, Endian::Big) => FieldValue::Int(r.read_i16::<BigEndian>()? as i64),
        (FieldKind::U32, Endian::Little) => FieldValue::Int(r.read_u32::<LittleEndian>()? as i64),
        (FieldKind::U32, Endian::Big) => FieldValue::Int(r.read_u32::<BigEndian>()? as i64),
        (FieldKind::I32, Endian::Little) => FieldValue::Int(r.read_i32::<LittleEndian>()? as i64),
        (FieldKind::I32, Endian::Big) => FieldValue::Int(r.read_i32::<BigEndian>()? as i64),
        (FieldKind::F32, Endian::Little) => FieldValue::Float(r.read_f32::<LittleEndian>()? as f64),
        (FieldKind::F32, Endian::Big) => FieldValue::Float(r.read_f32::<BigEndian>()? as f64),
        (FieldKind::F64, Endian::Little) => FieldValue::Float(r.read_f64::<LittleEndian>()?),
        (FieldKind::F64, Endian::Big) => FieldValue::Float(r.read_f64::<BigEndian>()?),
        (FieldKind::Bytes(n), _) => {
            let mut buf = vec![0u8; n];
            r.read_exact(&mut buf)?;
            FieldValue::Raw(buf)
        }
    };

    Ok(value)
}

/// Проходит таблицу полей по порядку.
pub fn decode_record<R: Read>(
    r: &mut R,
    table: &[FieldDef],
) -> io::Result<Record> {
    let mut values = Vec::with_capacity(table.len());

    for def in table {
        values.push((def.name, read_field(r, def)?));
    }

    Ok(Record { values })
}

impl Record {
    pub fn get(
        &self,
        name: &str,
    ) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.iter().map(|(n, _)| *n)
    }

    /// Целочисленное поле.
    pub fn int(
        &self,
        name: &str,
    ) -> AdcpResult<i64> {
        match self.get(name) {
            Some(FieldValue::Int(v)) => Ok(*v),
            Some(other) => Err(AdcpError::decode(format!(
                "field '{name}' is not an integer: {other:?}"
            ))),
            None => Err(AdcpError::decode(format!("missing field '{name}'"))),
        }
    }

    pub fn u8(
        &self,
        name: &str,
    ) -> AdcpResult<u8> {
        self.int(name).map(|v| v as u8)
    }

    pub fn u16(
        &self,
        name: &str,
    ) -> AdcpResult<u16> {
        self.int(name).map(|v| v as u16)
    }

    pub fn i16(
        &self,
        name: &str,
    ) -> AdcpResult<i16> {
        self.int(name).map(|v| v as i16)
    }

    pub fn u32(
        &self,
        name: &str,
    ) -> AdcpResult<u32> {
        self.int(name).map(|v| v as u32)
    }

    pub fn float(
        &self,
        name: &str,
    ) -> AdcpResult<f64> {
        match self.get(name) {
            Some(FieldValue::Float(v)) => Ok(*v),
            Some(FieldValue::Int(v)) => Ok(*v as f64),
            Some(other) => Err(AdcpError::decode(format!(
                "field '{name}' is not numeric: {other:?}"
            ))),
            None => Err(AdcpError::decode(format!("missing field '{name}'"))),
        }
    }

    /// Нераскодированные байты поля.
    pub fn bytes(
        &self,
        name: &str,
    ) -> AdcpResult<&[u8]> {
        match self.get(name) {
            Some(FieldValue::Raw(b)) => Ok(b),
            Some(other) => Err(AdcpError::decode(format!(
                "field '{name}' is not raw bytes: {other:?}"
            ))),
            None => Err(AdcpError::decode(format!("missing field '{name}'"))),
        }
    }

    /// Четыре поля `{prefix}_1..{prefix}_4` как массив.
    pub fn beams<T, F>(
        &self,
        prefix: &str,
        mut get: F,
    ) -> AdcpResult<[T; 4]>
    where
        T: Copy + Default,
        F: FnMut(&Self, &str) -> AdcpResult<T>,
    {
        let mut out = [T::default(); 4];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = get(self, &format!("{prefix}_{}", i + 1))?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const TABLE: &[FieldDef] = &[
        FieldDef::le("a", FieldKind::U16),
        FieldDef::be("b", FieldKind::U16),
        FieldDef::le("c", FieldKind::I16),
        FieldDef::raw("d", 2),
        FieldDef::le("e", FieldKind::F32),
    ];

    #[test]
    fn test_decode_record_mixed_endian() {
        let mut bytes = vec![0x34, 0x12, 0x12, 0x34, 0xFE, 0xFF, 0xAA, 0xBB];
        bytes.extend_from_slice(&1.5f32.to_le_bytes());

        let rec = decode_record(&mut Cursor::new(&bytes), TABLE).unwrap();

        assert_eq!(rec.len(), 5);
        assert_eq!(rec.u16("a").unwrap(), 0x1234);
        assert_eq!(rec.u16("b").unwrap(), 0x1234);
        assert_eq!(rec.i16("c").unwrap(), -2);
        assert_eq!(rec.bytes("d").unwrap(), &[0xAA, 0xBB]);
        assert_eq!(rec.float("e").unwrap(), 1.5);
        assert!(rec.int("d").is_err());
        assert!(rec.int("missing").is_err());
    }

    #[test]
    fn test_short_read_is_eof() {
        let bytes = [0x01, 0x02, 0x03];
        let err = decode_record(&mut Cursor::new(&bytes), TABLE).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_table_width_and_format() {
        assert_eq!(table_width(TABLE), 12);
        let formats: String = TABLE.iter().map(|f| f.kind.format_char()).collect();
        assert_eq!(formats, "HHhsf");
    }
}
