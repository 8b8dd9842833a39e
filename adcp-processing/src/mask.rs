//! Составные маски качества.
//!
//! Маска: логическое ИЛИ всех включённых критериев: `true` означает, что
//! значение исключается. Применение маски заменяет исключённые значения на
//! NaN и никогда не меняет форму массива.

use adcp_types::{AdcpError, AdcpResult, Array2, Array3};
use chrono::NaiveDateTime;
use log::debug;

use crate::{
    config::{BottomExclusion, ErrVelMax, MaskingConfig},
    transform::VelocityField,
};

/// Множитель межквартильного размаха для автоматического порога.
pub const IQR_FENCE: f64 = 3.0;

/// Входные массивы для построения масок.
#[derive(Debug, Clone, Copy)]
pub struct MaskInputs<'a> {
    /// `ансамбль × ячейка × луч`
    pub correlation: &'a Array3<u8>,
    pub echo_intensity: &'a Array3<u8>,
    pub percent_good: &'a Array3<u8>,
    /// Нужно, только если задан интервал обратного рассеяния
    pub absolute_backscatter: Option<&'a Array3<f64>>,
    /// `ансамбль × ячейка`; нужно, только если задан интервал скорости
    pub horizontal_speed: Option<&'a Array2<f64>>,
    pub error_velocity: Option<&'a Array2<f64>>,
    pub timestamps: &'a [Option<NaiveDateTime>],
    /// Наклонная дальность до дна, `ансамбль × луч`; `None` без донного
    /// трекинга
    pub bottom_range: Option<&'a Array2<f64>>,
    /// Расстояния до центров ячеек, м
    pub bin_centers: &'a [f64],
    pub cell_length: f64,
    pub beam_angle_deg: f64,
    /// У прибора, смотрящего вверх, донной границы нет
    pub down_looking: bool,
}

/// Построитель масок по конфигурации маскирования.
#[derive(Debug, Clone)]
pub struct QualityMaskEngine {
    config: MaskingConfig,
}

impl QualityMaskEngine {
    pub fn new(config: &MaskingConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Маска лучевых данных, `ансамбль × ячейка × луч`.
    pub fn beam_mask(
        &self,
        inputs: &MaskInputs<'_>,
    ) -> AdcpResult<Array3<bool>> {
        let cfg = &self.config.beam;
        let shape = inputs.echo_intensity.shape();
        check_shape3("correlation", inputs.correlation, shape)?;

        let backscatter = match inputs.absolute_backscatter {
            Some(sv) => {
                check_shape3("absolute backscatter", sv, shape)?;
                Some(sv)
            }
            None if cfg.absolute_backscatter.is_active() => {
                return Err(AdcpError::configuration(
                    "absolute backscatter bounds set but backscatter is unavailable",
                ))
            }
            None => None,
        };

        let bottom = BottomLimit::new(&cfg.bottom, inputs)?;
        let excluded_ens = ensemble_exclusions(
            shape.0,
            inputs.timestamps,
            |e| cfg.ensembles.excludes(e),
            |t| cfg.time.excludes(t),
        )?;

        let mask = Array3::from_fn(shape, |e, c, b| {
            excluded_ens[e]
                || cfg.correlation.excludes(inputs.correlation[(e, c, b)] as f64)
                || cfg.echo_intensity.excludes(inputs.echo_intensity[(e, c, b)] as f64)
                || backscatter.is_some_and(|sv| cfg.absolute_backscatter.excludes(sv[(e, c, b)]))
                || bottom
                    .as_ref()
                    .is_some_and(|lim| lim.excludes_beam(e, c, b))
        });

        debug!("Beam mask: {:.1}% excluded", coverage3(&mask) * 100.0);
        Ok(mask)
    }

    /// Маска скоростей, `ансамбль × ячейка`.
    pub fn velocity_mask(
        &self,
        inputs: &MaskInputs<'_>,
    ) -> AdcpResult<Array2<bool>> {
        let cfg = &self.config.velocity;
        let (n_ens, n_cells, n_beams) = inputs.percent_good.shape();
        let shape = (n_ens, n_cells);

        let speed = required2(
            inputs.horizontal_speed,
            cfg.speed.is_active(),
            "horizontal speed",
            shape,
        )?;
        let err_active = cfg.err_vel_min.is_some() || cfg.err_vel_max.is_some();
        let err_vel = required2(inputs.error_velocity, err_active, "error velocity", shape)?;

        if cfg.percent_good_min.is_some() && n_beams < 4 {
            return Err(AdcpError::invalid_geometry(format!(
                "percent-good criterion needs 4 beams, got {n_beams}"
            )));
        }

        // Нижний порог действует и в автоматическом режиме
        let below_min = |v: f64| cfg.err_vel_min.is_some_and(|min| v < min);
        let err_mask = err_vel.map(|ev| match cfg.err_vel_max {
            Some(ErrVelMax::Auto) => error_velocity_outliers(ev, cfg.err_vel_cap)
                .zip_map(ev, |&outlier, &v| outlier || below_min(v)),
            Some(ErrVelMax::Value(max)) => ev.map(|&v| v > max || below_min(v)),
            None => ev.map(|&v| below_min(v)),
        });

        let bottom = BottomLimit::new(&cfg.bottom, inputs)?;
        let excluded_ens = ensemble_exclusions(
            n_ens,
            inputs.timestamps,
            |e| cfg.ensembles.excludes(e),
            |t| cfg.time.excludes(t),
        )?;

        let mask = Array2::from_fn(shape, |e, c| {
            let pg_low = cfg.percent_good_min.is_some_and(|min| {
                let pg = &inputs.percent_good;
                (pg[(e, c, 0)] as f64 + pg[(e, c, 3)] as f64) < min
            });

            excluded_ens[e]
                || pg_low
                || speed.is_some_and(|s| cfg.speed.excludes(s[(e, c)]))
                || err_mask.as_ref().is_some_and(|m| m[(e, c)])
                || bottom.as_ref().is_some_and(|lim| lim.excludes_cell(e, c))
        });

        debug!("Velocity mask: {:.1}% excluded", coverage2(&mask) * 100.0);
        Ok(mask)
    }
}

/// Граница у дна с поправкой на боковые лепестки.
struct BottomLimit<'a> {
    /// Вертикальная дальность `range·cos θ`, `ансамбль × луч`
    vertical: Array2<f64>,
    bin_centers: &'a [f64],
    margin: f64,
}

impl<'a> BottomLimit<'a> {
    /// `None`, если исключение выключено, нет донного трекинга или прибор
    /// смотрит вверх.
    fn new(
        cfg: &BottomExclusion,
        inputs: &MaskInputs<'a>,
    ) -> AdcpResult<Option<Self>> {
        let range = match inputs.bottom_range {
            Some(r) if cfg.enabled && inputs.down_looking => r,
            _ => return Ok(None),
        };

        let n_ens = inputs.echo_intensity.shape().0;
        if range.shape().0 != n_ens {
            return Err(AdcpError::configuration(format!(
                "bottom range has {} ensembles, data has {n_ens}",
                range.shape().0
            )));
        }

        let cos = inputs.beam_angle_deg.to_radians().cos();
        Ok(Some(Self {
            vertical: range.map(|&r| r * cos),
            bin_centers: inputs.bin_centers,
            margin: cfg.offset_bins * inputs.cell_length,
        }))
    }

    fn beyond(
        &self,
        c: usize,
        limit: f64,
    ) -> bool {
        // NaN-граница ничего не исключает
        self.bin_centers
            .get(c)
            .is_some_and(|center| center + self.margin > limit)
    }

    fn excludes_beam(
        &self,
        e: usize,
        c: usize,
        b: usize,
    ) -> bool {
        let (_, n_beams) = self.vertical.shape();
        b < n_beams && self.beyond(c, self.vertical[(e, b)])
    }

    /// Для скоростей берётся ближайший к прибору луч.
    fn excludes_cell(
        &self,
        e: usize,
        c: usize,
    ) -> bool {
        let nearest = self
            .vertical
            .row(e)
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f64::NAN, f64::min);
        self.beyond(c, nearest)
    }
}

fn ensemble_exclusions<F, G>(
    n_ens: usize,
    timestamps: &[Option<NaiveDateTime>],
    by_index: F,
    by_time: G,
) -> AdcpResult<Vec<bool>>
where
    F: Fn(usize) -> bool,
    G: Fn(Option<NaiveDateTime>) -> bool,
{
    if timestamps.len() != n_ens {
        return Err(AdcpError::configuration(format!(
            "{} timestamps for {n_ens} ensembles",
            timestamps.len()
        )));
    }

    Ok((0..n_ens)
        .map(|e| by_index(e) || by_time(timestamps[e]))
        .collect())
}

fn check_shape3<T>(
    name: &str,
    a: &Array3<T>,
    expected: (usize, usize, usize),
) -> AdcpResult<()> {
    if a.shape() != expected {
        return Err(AdcpError::configuration(format!(
            "{name} shape {:?} does not match {expected:?}",
            a.shape()
        )));
    }
    Ok(())
}

fn required2<'a>(
    input: Option<&'a Array2<f64>>,
    needed: bool,
    name: &str,
    shape: (usize, usize),
) -> AdcpResult<Option<&'a Array2<f64>>> {
    match input {
        Some(a) if a.shape() != shape => Err(AdcpError::configuration(format!(
            "{name} shape {:?} does not match {shape:?}",
            a.shape()
        ))),
        Some(a) if needed => Ok(Some(a)),
        None if needed => Err(AdcpError::configuration(format!(
            "{name} criterion set but {name} is unavailable"
        ))),
        _ => Ok(None),
    }
}

/// Выбросы скорости ошибки: вне `[Q1 − 3·IQR, Q3 + 3·IQR]` по всем
/// конечным значениям ИЛИ `|v| > cap`.
pub fn error_velocity_outliers(
    values: &Array2<f64>,
    cap: f64,
) -> Array2<bool> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    finite.sort_by(f64::total_cmp);

    let fence = match (percentile(&finite, 25.0), percentile(&finite, 75.0)) {
        (Some(q1), Some(q3)) => {
            let iqr = q3 - q1;
            Some((q1 - IQR_FENCE * iqr, q3 + IQR_FENCE * iqr))
        }
        _ => None,
    };

    values.map(|&v| {
        let outlier = fence.is_some_and(|(lo, hi)| v < lo || v > hi);
        outlier || v.abs() > cap
    })
}

/// Перцентиль `p` (0..100) по отсортированным значениям с линейной
/// интерполяцией между соседними рангами.
pub fn percentile(
    sorted: &[f64],
    p: f64,
) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (p / 100.0).clamp(0.0, 1.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Подставляет NaN в исключённые позиции.
pub fn apply_beam_mask(
    data: &Array3<f64>,
    mask: &Array3<bool>,
) -> AdcpResult<Array3<f64>> {
    check_shape3("mask", mask, data.shape())?;
    Ok(data.zip_map(mask, |&v, &m| if m { f64::NAN } else { v }))
}

pub fn apply_velocity_mask(
    data: &Array2<f64>,
    mask: &Array2<bool>,
) -> AdcpResult<Array2<f64>> {
    if mask.shape() != data.shape() {
        return Err(AdcpError::configuration(format!(
            "mask shape {:?} does not match {:?}",
            mask.shape(),
            data.shape()
        )));
    }
    Ok(data.zip_map(mask, |&v, &m| if m { f64::NAN } else { v }))
}

/// Маска скоростей применяется ко всем компонентам поля.
pub fn mask_velocity_field(
    field: &VelocityField,
    mask: &Array2<bool>,
) -> AdcpResult<VelocityField> {
    let (n_ens, n_cells, n_comp) = field.data.shape();
    if mask.shape() != (n_ens, n_cells) {
        return Err(AdcpError::configuration(format!(
            "mask shape {:?} does not match velocity {:?}",
            mask.shape(),
            (n_ens, n_cells)
        )));
    }

    Ok(VelocityField {
        frame: field.frame,
        data: Array3::from_fn((n_ens, n_cells, n_comp), |e, c, k| {
            if mask[(e, c)] {
                f64::NAN
            } else {
                field.data[(e, c, k)]
            }
        }),
    })
}

/// Доля исключённых значений.
pub fn coverage3(mask: &Array3<bool>) -> f64 {
    fraction(mask.iter().filter(|&&m| m).count(), mask.len())
}

pub fn coverage2(mask: &Array2<bool>) -> f64 {
    fraction(mask.iter().filter(|&&m| m).count(), mask.len())
}

fn fraction(
    n: usize,
    total: usize,
) -> f64 {
    if total == 0 {
        0.0
    } else {
        n as f64 / total as f64
    }
}
