//! Абсолютное обратное рассеяние, отношение сигнал/шум и концентрация
//! взвеси по эхо-сигналу.
//!
//! ```text
//! Sv  = C + 10·log10((T + 273.16)·R²) − 10·log10(L) − P + 2αR
//!         + 10·log10(10^(0.1·kc·(E − Er)) − 1)
//! StN = (10^(kc·E/10) − 10^(kc·Er/10)) / 10^(kc·Er/10)
//! SSC = 10^(A + B·Sv)
//! ```
//! Аргументы логарифмов и знаменатели ограничены снизу `1e-10`; оставшиеся
//! нечисловые значения отдаются как NaN.

use adcp_core::Pd0Data;
use adcp_types::{AdcpError, AdcpResult, Array3, FixedLeader, Frequency};
use log::debug;

use crate::{
    absorption::{
        sediment_absorption, water_absorption, water_density, SedimentProperties, WaterProperties,
    },
    config::{ProcessingConfig, SscCalibration},
};

/// Нижняя граница аргументов логарифма и знаменателей.
const MIN_ARG: f64 = 1e-10;

/// Системная константа `C` по умолчанию, дБ.
pub fn default_system_constant(
    frequency: Frequency,
    broadband: bool,
) -> AdcpResult<f64> {
    let (bb, nb) = match frequency {
        Frequency::Khz75 => (-159.1, -163.5),
        Frequency::Khz150 => (-150.1, -155.0),
        Frequency::Khz300 => (-143.5, -147.5),
        Frequency::Khz600 => (-139.3, -149.1),
        Frequency::Khz1200 => (-129.1, -138.0),
        other => {
            return Err(AdcpError::configuration(format!(
                "no default system constant for {other:?}; set acoustics.system_constant"
            )))
        }
    };
    Ok(if broadband { bb } else { nb })
}

/// Мощность излучения по умолчанию, дБВт.
pub fn default_transmit_power(frequency: Frequency) -> AdcpResult<f64> {
    match frequency {
        Frequency::Khz75 => Ok(27.3),
        Frequency::Khz150 => Ok(20.0),
        Frequency::Khz300 => Ok(14.0),
        Frequency::Khz600 => Ok(9.0),
        Frequency::Khz1200 => Ok(4.8),
        other => Err(AdcpError::configuration(format!(
            "no default transmit power for {other:?}; set acoustics.transmit_power_dbw"
        ))),
    }
}

/// Наклонная дальность до середины каждой ячейки, м.
///
/// `R = (blank + (L + D)/2 + (n − 1)·D + D/4) / cos θ`, где `L`: длина
/// импульса, `D`: длина ячейки, `n`: номер ячейки с единицы.
pub fn slant_ranges(fixed_leader: &FixedLeader) -> AdcpResult<Vec<f64>> {
    let angle = fixed_leader.beam_angle_deg();
    let valid = (0.0..90.0).contains(&angle);
    if !valid {
        return Err(AdcpError::invalid_geometry(format!(
            "beam angle must be in [0, 90) degrees, got {angle}"
        )));
    }

    let cos = angle.to_radians().cos();
    let blank = fixed_leader.blank_after_transmit_cm as f64 / 100.0;
    let pulse = fixed_leader.transmit_pulse_length_m();
    let cell = fixed_leader.cell_length_m();

    Ok((0..fixed_leader.n_cells as usize)
        .map(|n| (blank + (pulse + cell) / 2.0 + n as f64 * cell + cell / 4.0) / cos)
        .collect())
}

/// Параметры уравнения гидролокации для одного файла.
#[derive(Debug, Clone, PartialEq)]
pub struct SonarParameters {
    /// дБ
    pub system_constant: f64,
    /// дБВт
    pub transmit_power_dbw: f64,
    /// м
    pub pulse_length: f64,
    /// дБ на отсчёт, по лучам
    pub rssi_scale: Vec<f64>,
    /// Отсчёты, по лучам
    pub noise_floor: Vec<f64>,
    /// м, по ячейкам
    pub slant_range: Vec<f64>,
    /// Температура преобразователя, °C, по ансамблям
    pub transducer_temperature: Vec<f64>,
    /// Суммарное затухание, дБ/м, по ансамблям
    pub absorption: Vec<f64>,
}

/// Калибровка эхо-сигнала.
#[derive(Debug, Clone)]
pub struct AcousticBackscatterEngine {
    params: SonarParameters,
    ssc: Option<SscCalibration>,
}

impl AcousticBackscatterEngine {
    /// Собирает параметры из файла и конфигурации.
    pub fn new(
        data: &Pd0Data,
        config: &ProcessingConfig,
    ) -> AdcpResult<Self> {
        let fl = &data.fixed_leader;
        let n_beams = data.n_beams();
        let acoustics = &config.acoustics;

        if n_beams > acoustics.rssi_scale.len() {
            return Err(AdcpError::invalid_geometry(format!(
                "backscatter supports up to 4 beams, got {n_beams}"
            )));
        }

        let band = fl.system_configuration.frequency;
        let band_or_err = || {
            band.ok_or_else(|| {
                AdcpError::configuration("instrument frequency unknown; set acoustics.frequency_khz")
            })
        };

        let frequency_khz = match acoustics.frequency_khz {
            Some(f) => f,
            None => band_or_err()?.khz(),
        };
        let system_constant = match acoustics.system_constant {
            Some(c) => c,
            None => default_system_constant(band_or_err()?, fl.is_broadband())?,
        };
        let transmit_power_dbw = match acoustics.transmit_power_dbw {
            Some(p) => p,
            None => default_transmit_power(band_or_err()?)?,
        };

        let noise_floor = match acoustics.noise_floor {
            Some(nf) => vec![nf; n_beams],
            None => minimum_echo(&data.echo_intensity),
        };

        let sediment = SedimentProperties {
            diameter: config.sediment.particle_diameter,
            density: config.sediment.particle_density,
            concentration: config.sediment.concentration,
        };

        let absorption = data
            .variable_leaders
            .iter()
            .map(|vl| {
                let water = WaterProperties {
                    temperature: config.water.temperature.unwrap_or(vl.temperature_c()),
                    salinity: config.water.salinity.unwrap_or(vl.salinity as f64),
                    depth: vl.depth_of_transducer_m(),
                    ph: config.water.ph,
                };
                let rho_w = config
                    .water
                    .density
                    .unwrap_or_else(|| water_density(water.temperature, water.salinity));

                water_absorption(frequency_khz, &water)
                    + sediment_absorption(frequency_khz, &sediment, rho_w, &water)
            })
            .collect();

        debug!(
            "Sonar parameters: f={frequency_khz} kHz, C={system_constant} dB, P={transmit_power_dbw} dBW"
        );

        let params = SonarParameters {
            system_constant,
            transmit_power_dbw,
            pulse_length: fl.transmit_pulse_length_m(),
            rssi_scale: acoustics.rssi_scale[..n_beams].to_vec(),
            noise_floor,
            slant_range: slant_ranges(fl)?,
            transducer_temperature: data
                .variable_leaders
                .iter()
                .map(|vl| vl.temperature_c())
                .collect(),
            absorption,
        };

        Ok(Self::from_parameters(params, acoustics.ssc))
    }

    pub fn from_parameters(
        params: SonarParameters,
        ssc: Option<SscCalibration>,
    ) -> Self {
        Self { params, ssc }
    }

    pub fn parameters(&self) -> &SonarParameters {
        &self.params
    }

    /// Абсолютное обратное рассеяние `Sv`, дБ.
    pub fn absolute_backscatter(
        &self,
        echo: &Array3<u8>,
    ) -> AdcpResult<Array3<f64>> {
        self.check_shape(echo)?;
        let p = &self.params;
        let pulse_term = 10.0 * p.pulse_length.max(MIN_ARG).log10();

        Ok(Array3::from_fn(echo.shape(), |e, c, b| {
            let r = p.slant_range[c];
            let kc = p.rssi_scale[b];
            let excess = 10f64.powf(0.1 * kc * (echo[(e, c, b)] as f64 - p.noise_floor[b])) - 1.0;
            let temp = ((p.transducer_temperature[e] + 273.16) * r * r).max(MIN_ARG);

            finite_or_nan(
                p.system_constant + 10.0 * temp.log10() - pulse_term - p.transmit_power_dbw
                    + 2.0 * p.absorption[e] * r
                    + 10.0 * excess.max(MIN_ARG).log10(),
            )
        }))
    }

    /// Отношение сигнал/шум (линейное). Ниже шума отрицательно.
    pub fn signal_to_noise(
        &self,
        echo: &Array3<u8>,
    ) -> AdcpResult<Array3<f64>> {
        self.check_shape(echo)?;
        let p = &self.params;

        Ok(Array3::from_fn(echo.shape(), |e, c, b| {
            let kc = p.rssi_scale[b];
            let signal = 10f64.powf(kc * echo[(e, c, b)] as f64 / 10.0);
            let noise = 10f64.powf(kc * p.noise_floor[b] / 10.0);
            finite_or_nan((signal - noise) / noise.max(MIN_ARG))
        }))
    }

    /// Концентрация взвеси по калибровке `(A, B)`.
    pub fn suspended_sediment(
        &self,
        sv: &Array3<f64>,
    ) -> AdcpResult<Array3<f64>> {
        let SscCalibration { a, b } = self.ssc.ok_or_else(|| {
            AdcpError::configuration("SSC calibration (acoustics.ssc) is not configured")
        })?;
        Ok(sv.map(|&v| finite_or_nan(10f64.powf(a + b * v))))
    }

    fn check_shape(
        &self,
        echo: &Array3<u8>,
    ) -> AdcpResult<()> {
        let (n_ens, n_cells, n_beams) = echo.shape();
        let p = &self.params;
        let expected = (
            p.transducer_temperature.len().min(p.absorption.len()),
            p.slant_range.len(),
            p.rssi_scale.len().min(p.noise_floor.len()),
        );

        if (n_ens, n_cells, n_beams) != expected {
            return Err(AdcpError::configuration(format!(
                "echo shape {:?} does not match sonar parameters {expected:?}",
                echo.shape()
            )));
        }
        Ok(())
    }
}

/// Минимальный эхо-сигнал по каждому лучу.
fn minimum_echo(echo: &Array3<u8>) -> Vec<f64> {
    let (n_ens, n_cells, n_beams) = echo.shape();
    (0..n_beams)
        .map(|b| {
            let min = (0..n_ens)
                .flat_map(|e| (0..n_cells).map(move |c| (e, c)))
                .map(|(e, c)| echo[(e, c, b)])
                .min()
                .unwrap_or(0);
            min as f64
        })
        .collect()
}

fn finite_or_nan(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        f64::NAN
    }
}
