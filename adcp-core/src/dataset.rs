use adcp_types::{
    scale_velocity, AdcpError, AdcpResult, Array3, BottomTrack, CoordinateFrame, FixedLeader,
    Header, VariableLeader,
};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Один декодированный ансамбль.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    /// Порядковый номер ансамбля в файле (с нуля)
    pub index: usize,
    pub header: Header,
    pub fixed_leader: FixedLeader,
    pub variable_leader: VariableLeader,
    /// `ячейка × луч`, мм/с
    pub velocity: Vec<i16>,
    pub correlation: Vec<u8>,
    pub echo_intensity: Vec<u8>,
    pub percent_good: Vec<u8>,
    pub bottom_track: Option<BottomTrack>,
    /// Контрольная сумма совпала
    pub checksum_ok: bool,
}

/// Достоверность числа ансамблей.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum CountStatus {
    /// Оценка `размер файла / шаг`, полный проход ещё не выполнялся
    Approximate,
    /// Подтверждено полным проходом
    Exact,
    /// Файл обрезан или повреждён на ансамбле `at`; число ансамблей = `at`
    Truncated { at: usize },
}

/// Статистика, накопленная в процессе декодирования.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    /// Успешно декодированных ансамблей.
    pub ensembles_ok: u64,
    /// Ансамблей с несовпавшей контрольной суммой (данные сохранены).
    pub checksum_failures: u64,
    /// Байт, пропущенных до первого синхро.
    pub bytes_skipped: u64,
    /// Хвостовые байты после последнего полного ансамбля.
    pub trailing_bytes: u64,
    /// Индекс ансамбля, на котором файл признан усечённым.
    pub truncated_at: Option<usize>,
}

/// Все ансамбли файла, собранные в массивы.
#[derive(Debug, Clone)]
pub struct Pd0Data {
    /// Заголовок первого ансамбля
    pub header: Header,
    /// Фиксированный лидер первого ансамбля
    pub fixed_leader: FixedLeader,
    pub variable_leaders: Vec<VariableLeader>,
    /// `ансамбль × ячейка × луч`, мм/с
    pub velocity: Array3<i16>,
    pub correlation: Array3<u8>,
    pub echo_intensity: Array3<u8>,
    pub percent_good: Array3<u8>,
    /// `None`, если в файле нет донного трекинга
    pub bottom_track: Option<Vec<BottomTrack>>,
    pub count_status: CountStatus,
    pub stats: DecodeStats,
    /// Смещение первого ансамбля в файле
    pub first_offset: u64,
    /// Шаг между ансамблями
    pub stride: u64,
}

impl CountStatus {
    pub fn is_approximate(&self) -> bool {
        matches!(self, CountStatus::Approximate)
    }
}

impl Pd0Data {
    /// Создаёт набор данных по первому ансамблю.
    pub fn new(
        first: Ensemble,
        first_offset: u64,
        capacity: usize,
    ) -> Self {
        let n_cells = first.fixed_leader.n_cells as usize;
        let n_beams = first.fixed_leader.n_beams as usize;
        let has_bt = first.bottom_track.is_some();

        let mut data = Pd0Data {
            header: first.header.clone(),
            fixed_leader: first.fixed_leader.clone(),
            variable_leaders: Vec::with_capacity(capacity),
            velocity: Array3::with_inner(n_cells, n_beams, capacity),
            correlation: Array3::with_inner(n_cells, n_beams, capacity),
            echo_intensity: Array3::with_inner(n_cells, n_beams, capacity),
            percent_good: Array3::with_inner(n_cells, n_beams, capacity),
            bottom_track: has_bt.then(|| Vec::with_capacity(capacity)),
            count_status: CountStatus::Approximate,
            stats: DecodeStats::default(),
            first_offset,
            stride: first.header.stride(),
        };

        data.push(first);
        data
    }

    /// Дописывает ансамбль. Все четыре массива растут синхронно.
    pub fn push(
        &mut self,
        ens: Ensemble,
    ) {
        self.velocity.push_plane(ens.velocity);
        self.correlation.push_plane(ens.correlation);
        self.echo_intensity.push_plane(ens.echo_intensity);
        self.percent_good.push_plane(ens.percent_good);
        self.variable_leaders.push(ens.variable_leader);

        // Пропавшая секция: дальность и скорость не определены
        if let Some(bt) = self.bottom_track.as_mut() {
            bt.push(ens.bottom_track.unwrap_or_else(BottomTrack::missing));
        }
    }

    pub fn n_ensembles(&self) -> usize {
        self.variable_leaders.len()
    }

    pub fn n_cells(&self) -> usize {
        self.fixed_leader.n_cells as usize
    }

    pub fn n_beams(&self) -> usize {
        self.fixed_leader.n_beams as usize
    }

    /// Система координат, в которой прибор записал скорости.
    pub fn native_frame(&self) -> CoordinateFrame {
        self.fixed_leader.coordinate_transform.frame
    }

    pub fn has_bottom_track(&self) -> bool {
        self.bottom_track.is_some()
    }

    pub fn timestamps(&self) -> Vec<Option<NaiveDateTime>> {
        self.variable_leaders
            .iter()
            .map(VariableLeader::timestamp)
            .collect()
    }

    /// Скорости в м/с; маркер отсутствия данных становится NaN.
    pub fn velocity_m_s(&self) -> Array3<f64> {
        self.velocity.map(|&v| scale_velocity(v))
    }

    /// Проверяет, что все массивы имеют одинаковое число ансамблей.
    pub fn validate_lengths(&self) -> AdcpResult<()> {
        let n = self.n_ensembles();
        let lens = [
            self.velocity.shape().0,
            self.correlation.shape().0,
            self.echo_intensity.shape().0,
            self.percent_good.shape().0,
            self.bottom_track.as_ref().map_or(n, Vec::len),
        ];

        if lens.iter().any(|&l| l != n) {
            return Err(AdcpError::decode(format!(
                "array lengths diverged: leaders={n}, arrays={lens:?}"
            )));
        }

        Ok(())
    }
}
