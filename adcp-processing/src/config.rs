use std::path::Path;

use adcp_types::{AdcpError, AdcpResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Полная конфигурация обработки.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    pub acoustics: AcousticsConfig,
    pub water: WaterConfig,
    pub sediment: SedimentConfig,
    pub orientation: OrientationConfig,
    pub platform: PlatformConfig,
    pub masking: MaskingConfig,
    pub geometry: GeometryConfig,
}

/// Параметры уравнения гидролокации.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcousticsConfig {
    /// Уровень шума `E_r` (отсчёты); `None`: минимум эха по лучу
    pub noise_floor: Option<f64>,
    /// Системная константа `C` (дБ); `None`: из таблицы по частоте
    pub system_constant: Option<f64>,
    /// Мощность излучения (дБВт); `None`: из таблицы по частоте
    pub transmit_power_dbw: Option<f64>,
    /// Масштаб отсчёты → дБ по лучам
    pub rssi_scale: [f64; 4],
    /// Частота (кГц); `None`: из слова конфигурации
    pub frequency_khz: Option<f64>,
    /// Калибровка `SSC = 10^(A + B·Sv)`
    pub ssc: Option<SscCalibration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SscCalibration {
    pub a: f64,
    pub b: f64,
}

/// Свойства воды. Пустые поля берутся из переменного лидера.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaterConfig {
    /// °C
    pub temperature: Option<f64>,
    /// PSU
    pub salinity: Option<f64>,
    pub ph: f64,
    /// кг/м³; `None`: EOS-80 по температуре и солёности
    pub density: Option<f64>,
}

/// Взвесь для поглощения в осадке.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SedimentConfig {
    /// Диаметр частиц, м
    pub particle_diameter: f64,
    /// Плотность частиц, кг/м³
    pub particle_density: f64,
    /// Концентрация, кг/м³
    pub concentration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrientationConfig {
    /// Магнитное склонение, градусы (к востоку положительное)
    pub magnetic_declination: f64,
    /// Поправка курса, градусы
    pub heading_bias: f64,
    /// Учитывать тангаж и крен
    pub use_tilt: bool,
}

/// Положение прибора относительно опорной точки судна (CRP).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformConfig {
    /// Смещение X/Y/Z, м
    pub crp_offset: [f64; 3],
    /// Поворот прибора относительно судна, градусы
    pub crp_rotation: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeometryConfig {
    /// Отрицательная высота над дном заменяется на NaN
    pub clamp_hab: bool,
}

////////////////////////////////////////////////////////////////////////////////
// Маскирование
////////////////////////////////////////////////////////////////////////////////

/// Допустимый интервал `[min, max]`; пустая граница не проверяется.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Bounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Окно индексов ансамблей (включительно).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnsembleWindow {
    pub first: Option<usize>,
    pub last: Option<usize>,
}

/// Окно времени (включительно).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeWindow {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

/// Исключение ячеек у дна по донному трекингу.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BottomExclusion {
    pub enabled: bool,
    /// Запас над дном в длинах ячейки
    pub offset_bins: f64,
}

/// Верхний порог скорости ошибки: число или `"auto"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ErrVelRaw", into = "ErrVelRaw")]
pub enum ErrVelMax {
    Value(f64),
    /// Выбросы по IQR (k = 3) ИЛИ превышение абсолютного порога
    Auto,
}

/// Представление [`ErrVelMax`] в JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrVelRaw {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BeamMaskConfig {
    pub correlation: Bounds,
    pub echo_intensity: Bounds,
    /// Абсолютное обратное рассеяние, дБ
    pub absolute_backscatter: Bounds,
    pub ensembles: EnsembleWindow,
    pub time: TimeWindow,
    pub bottom: BottomExclusion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VelocityMaskConfig {
    /// Горизонтальная скорость, м/с
    pub speed: Bounds,
    /// Минимум суммы процентов годных (лучи 1 + 4)
    pub percent_good_min: Option<f64>,
    /// Нижняя граница скорости ошибки, м/с (для числового верхнего порога)
    pub err_vel_min: Option<f64>,
    pub err_vel_max: Option<ErrVelMax>,
    /// Абсолютный порог для режима `"auto"`, м/с
    pub err_vel_cap: f64,
    pub ensembles: EnsembleWindow,
    pub time: TimeWindow,
    pub bottom: BottomExclusion,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaskingConfig {
    pub beam: BeamMaskConfig,
    pub velocity: VelocityMaskConfig,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ProcessingConfig {
    /// Разбирает JSON; ошибка разбора или проверки: `ConfigurationError`.
    pub fn from_json_str(s: &str) -> AdcpResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| AdcpError::configuration(format!("invalid processing config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> AdcpResult<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn to_json_pretty(&self) -> AdcpResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AdcpError::configuration(format!("cannot serialize config: {e}")))
    }

    /// Проверяет согласованность значений.
    pub fn validate(&self) -> AdcpResult<()> {
        if !self.acoustics.rssi_scale.iter().all(|&k| is_positive(k)) {
            return Err(AdcpError::configuration(
                "rssi_scale must be positive for every beam",
            ));
        }

        if let Some(f) = self.acoustics.frequency_khz {
            if !is_positive(f) {
                return Err(AdcpError::configuration(format!(
                    "frequency_khz must be positive, got {f}"
                )));
            }
        }

        let sed = &self.sediment;
        if !is_positive(sed.particle_diameter) || !is_positive(sed.particle_density) {
            return Err(AdcpError::configuration(
                "sediment particle diameter and density must be positive",
            ));
        }

        if self.sediment.concentration < 0.0 {
            return Err(AdcpError::configuration("sediment concentration must not be negative"));
        }

        let m = &self.masking;
        for (name, b) in [
            ("beam.correlation", m.beam.correlation),
            ("beam.echo_intensity", m.beam.echo_intensity),
            ("beam.absolute_backscatter", m.beam.absolute_backscatter),
            ("velocity.speed", m.velocity.speed),
        ] {
            b.validate(name)?;
        }

        for (name, w) in [
            ("beam.ensembles", m.beam.ensembles),
            ("velocity.ensembles", m.velocity.ensembles),
        ] {
            if let (Some(first), Some(last)) = (w.first, w.last) {
                if first > last {
                    return Err(AdcpError::configuration(format!(
                        "{name}: first ({first}) is after last ({last})"
                    )));
                }
            }
        }

        if let Some(ErrVelMax::Value(max)) = m.velocity.err_vel_max {
            if let Some(min) = m.velocity.err_vel_min {
                if min > max {
                    return Err(AdcpError::configuration(format!(
                        "err_vel_min ({min}) exceeds err_vel_max ({max})"
                    )));
                }
            }
        }

        if !is_positive(m.velocity.err_vel_cap) {
            return Err(AdcpError::configuration("err_vel_cap must be positive"));
        }

        Ok(())
    }
}

fn is_positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

impl Bounds {
    pub fn new(
        min: Option<f64>,
        max: Option<f64>,
    ) -> Self {
        Self { min, max }
    }

    pub fn is_active(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// Значение вне интервала. NaN никогда не исключается.
    pub fn excludes(
        &self,
        v: f64,
    ) -> bool {
        self.min.is_some_and(|min| v < min) || self.max.is_some_and(|max| v > max)
    }

    fn validate(
        &self,
        name: &str,
    ) -> AdcpResult<()> {
        match (self.min, self.max) {
            (Some(min), Some(max)) if min > max => Err(AdcpError::configuration(format!(
                "{name}: min ({min}) exceeds max ({max})"
            ))),
            _ => Ok(()),
        }
    }
}

impl EnsembleWindow {
    pub fn is_active(&self) -> bool {
        self.first.is_some() || self.last.is_some()
    }

    pub fn excludes(
        &self,
        index: usize,
    ) -> bool {
        self.first.is_some_and(|f| index < f) || self.last.is_some_and(|l| index > l)
    }
}

impl TimeWindow {
    pub fn is_active(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    /// Ансамбль без корректного времени исключается активным окном.
    pub fn excludes(
        &self,
        ts: Option<NaiveDateTime>,
    ) -> bool {
        if !self.is_active() {
            return false;
        }
        match ts {
            Some(t) => self.start.is_some_and(|s| t < s) || self.end.is_some_and(|e| t > e),
            None => true,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for AcousticsConfig {
    fn default() -> Self {
        Self {
            noise_floor: None,
            system_constant: None,
            transmit_power_dbw: None,
            rssi_scale: [0.45; 4],
            frequency_khz: None,
            ssc: None,
        }
    }
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            temperature: None,
            salinity: None,
            ph: 8.0,
            density: None,
        }
    }
}

impl Default for SedimentConfig {
    fn default() -> Self {
        Self {
            particle_diameter: 1.0e-4,
            particle_density: 2650.0,
            concentration: 0.0,
        }
    }
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            magnetic_declination: 0.0,
            heading_bias: 0.0,
            use_tilt: true,
        }
    }
}

impl Default for VelocityMaskConfig {
    fn default() -> Self {
        Self {
            speed: Bounds::default(),
            percent_good_min: None,
            err_vel_min: None,
            err_vel_max: None,
            err_vel_cap: 0.5,
            ensembles: EnsembleWindow::default(),
            time: TimeWindow::default(),
            bottom: BottomExclusion::default(),
        }
    }
}

impl TryFrom<ErrVelRaw> for ErrVelMax {
    type Error = String;

    fn try_from(raw: ErrVelRaw) -> Result<Self, Self::Error> {
        match raw {
            ErrVelRaw::Number(v) if v.is_finite() => Ok(ErrVelMax::Value(v)),
            ErrVelRaw::Number(v) => Err(format!("err_vel_max must be finite, got {v}")),
            ErrVelRaw::Text(s) if s.eq_ignore_ascii_case("auto") => Ok(ErrVelMax::Auto),
            ErrVelRaw::Text(s) => Err(format!(
                "err_vel_max must be a number or \"auto\", got '{s}'"
            )),
        }
    }
}

impl From<ErrVelMax> for ErrVelRaw {
    fn from(v: ErrVelMax) -> Self {
        match v {
            ErrVelMax::Value(v) => ErrVelRaw::Number(v),
            ErrVelMax::Auto => ErrVelRaw::Text("auto".to_string()),
        }
    }
}

impl std::str::FromStr for ErrVelMax {
    type Err = AdcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = match s.trim().parse::<f64>() {
            Ok(v) => ErrVelRaw::Number(v),
            Err(_) => ErrVelRaw::Text(s.trim().to_string()),
        };
        ErrVelMax::try_from(raw).map_err(AdcpError::configuration)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
