use serde::{Deserialize, Serialize};

/// Заголовок ансамбля PD0.
///
/// Смещения секций отсчитываются от начала ансамбля (первого байта синхро).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Идентификатор заголовка (0x7F)
    pub header_id: u8,
    /// Идентификатор источника данных (0x7F)
    pub source_id: u8,
    /// Длина ансамбля в байтах без 2 байт контрольной суммы
    pub n_bytes: u16,
    pub spare: u8,
    /// Количество секций данных
    pub n_data_types: u8,
    /// Смещения секций, по одному на каждую секцию
    pub offsets: Vec<u16>,
}

impl Header {
    /// Шаг между ансамблями в файле: длина + 2 байта контрольной суммы.
    pub fn stride(&self) -> u64 {
        self.n_bytes as u64 + 2
    }

    /// Секция донного трекинга объявлена только при 7 и более секциях.
    pub fn declares_bottom_track(&self) -> bool {
        self.n_data_types >= 7
    }

    /// Размер самого заголовка: 6 байт + 2 байта на смещение.
    pub fn encoded_len(&self) -> usize {
        6 + 2 * self.offsets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_stride() {
        let h = Header {
            header_id: 0x7F,
            source_id: 0x7F,
            n_bytes: 1000,
            spare: 0,
            n_data_types: 6,
            offsets: vec![18, 77, 142, 344, 446, 548],
        };
        assert_eq!(h.stride(), 1002);
        assert_eq!(h.encoded_len(), 18);
        assert!(!h.declares_bottom_track());
    }
}
