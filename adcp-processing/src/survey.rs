//! Сеанс обработки одного файла.
//!
//! `Survey` владеет декодированными данными, конфигурацией и навигацией.
//! Производные массивы и маски считаются по запросу и кешируются; смена
//! конфигурации или навигации сбрасывает кеш. Маски применяются при чтении,
//! исходные данные не изменяются.

use std::{collections::HashMap, path::Path};

use adcp_core::{decode_parallel, Pd0Data, Pd0Reader};
use adcp_types::{AdcpResult, Array2, Array3, CoordinateFrame};
use log::{debug, info};

use crate::{
    backscatter::AcousticBackscatterEngine,
    config::ProcessingConfig,
    geometry::BottomTrackGeometryEngine,
    mask::{
        apply_beam_mask, apply_velocity_mask, mask_velocity_field, MaskInputs, QualityMaskEngine,
    },
    navigation::{Attitude, Navigation, Positions},
    transform::{CoordinateTransformEngine, VelocityField},
};

#[derive(Debug, Default)]
struct DerivedCache {
    attitude: Option<Attitude>,
    positions: Option<Positions>,
    velocity: HashMap<CoordinateFrame, VelocityField>,
    backscatter: Option<Array3<f64>>,
    signal_to_noise: Option<Array3<f64>>,
    adjusted_range: Option<Array2<f64>>,
    height_above_bed: Option<Array3<f64>>,
    beam_mask: Option<Array3<bool>>,
    velocity_mask: Option<Array2<bool>>,
}

/// Декодированный файл вместе с настройками обработки.
#[derive(Debug)]
pub struct Survey {
    data: Pd0Data,
    config: ProcessingConfig,
    navigation: Option<Navigation>,
    cache: DerivedCache,
}

impl Survey {
    pub fn new(
        data: Pd0Data,
        config: ProcessingConfig,
    ) -> AdcpResult<Self> {
        config.validate()?;
        Ok(Self {
            data,
            config,
            navigation: None,
            cache: DerivedCache::default(),
        })
    }

    /// Декодирует файл; `workers > 1` включает параллельное чтение.
    pub fn open<P: AsRef<Path>>(
        path: P,
        config: ProcessingConfig,
        workers: usize,
    ) -> AdcpResult<Self> {
        let path = path.as_ref();
        let data = if workers > 1 {
            decode_parallel(path, workers)?
        } else {
            Pd0Reader::open(path)?.read_all()?
        };

        info!(
            "Opened {}: {} ensembles, native frame {}",
            path.display(),
            data.n_ensembles(),
            data.native_frame()
        );
        Self::new(data, config)
    }

    pub fn data(&self) -> &Pd0Data {
        &self.data
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn navigation(&self) -> Option<&Navigation> {
        self.navigation.as_ref()
    }

    pub fn n_ensembles(&self) -> usize {
        self.data.n_ensembles()
    }

    pub fn set_config(
        &mut self,
        config: ProcessingConfig,
    ) -> AdcpResult<()> {
        config.validate()?;
        self.config = config;
        self.invalidate();
        Ok(())
    }

    /// Задаёт навигацию; длины рядов должны совпадать с числом ансамблей.
    pub fn set_navigation(
        &mut self,
        navigation: Option<Navigation>,
    ) -> AdcpResult<()> {
        if let Some(nav) = &navigation {
            nav.validate(self.n_ensembles())?;
        }
        self.navigation = navigation;
        self.invalidate();
        Ok(())
    }

    fn invalidate(&mut self) {
        debug!("Derived cache invalidated");
        self.cache = DerivedCache::default();
    }

    ////////////////////////////////////////////////////////////////////////////
    // Ориентация и положение
    ////////////////////////////////////////////////////////////////////////////

    pub fn attitude(&mut self) -> AdcpResult<&Attitude> {
        let att = match self.cache.attitude.take() {
            Some(att) => att,
            None => Attitude::resolve(
                &self.data.variable_leaders,
                self.navigation.as_ref(),
                &self.config.orientation,
            )?,
        };
        Ok(self.cache.attitude.insert(att))
    }

    pub fn positions(&mut self) -> AdcpResult<&Positions> {
        let pos = match self.cache.positions.take() {
            Some(pos) => pos,
            None => Positions::resolve(self.n_ensembles(), self.navigation.as_ref())?,
        };
        Ok(self.cache.positions.insert(pos))
    }

    pub fn transform_engine(&mut self) -> AdcpResult<CoordinateTransformEngine> {
        let attitude = self.attitude()?.clone();
        Ok(CoordinateTransformEngine::new(&self.data.fixed_leader, attitude))
    }

    pub fn geometry_engine(&mut self) -> AdcpResult<BottomTrackGeometryEngine> {
        let attitude = self.attitude()?.clone();
        let positions = self.positions()?.clone();
        BottomTrackGeometryEngine::new(
            &self.data.fixed_leader,
            attitude,
            positions,
            &self.config.platform,
            &self.config.geometry,
        )
    }

    ////////////////////////////////////////////////////////////////////////////
    // Скорости
    ////////////////////////////////////////////////////////////////////////////

    /// Скорости в системе `frame` без маски.
    pub fn raw_velocity(
        &mut self,
        frame: CoordinateFrame,
    ) -> AdcpResult<&VelocityField> {
        if !self.cache.velocity.contains_key(&frame) {
            let native = VelocityField::from_raw(&self.data.velocity, self.data.native_frame())?;
            let field = self.transform_engine()?.transform(&native, frame)?;
            self.cache.velocity.insert(frame, field);
        }
        Ok(&self.cache.velocity[&frame])
    }

    /// Скорости в системе `frame` с применённой маской скоростей.
    pub fn velocity(
        &mut self,
        frame: CoordinateFrame,
    ) -> AdcpResult<VelocityField> {
        let mask = self.velocity_mask()?.clone();
        mask_velocity_field(self.raw_velocity(frame)?, &mask)
    }

    /// Горизонтальная скорость по маскированным компонентам.
    pub fn speed(
        &mut self,
        frame: CoordinateFrame,
    ) -> AdcpResult<Array2<f64>> {
        self.velocity(frame)?.horizontal_speed()
    }

    pub fn direction(
        &mut self,
        frame: CoordinateFrame,
    ) -> AdcpResult<Array2<f64>> {
        self.velocity(frame)?.direction()
    }

    /// Скорости донного трекинга, `ансамбль × компонента`; `None` без
    /// донного трекинга.
    pub fn bottom_track_velocity(
        &mut self,
        frame: CoordinateFrame,
    ) -> AdcpResult<Option<Array2<f64>>> {
        let native = self.data.native_frame();
        let engine = self.transform_engine()?;
        self.data
            .bottom_track
            .as_deref()
            .map(|bt| engine.transform_bottom_track(bt, native, frame))
            .transpose()
    }

    ////////////////////////////////////////////////////////////////////////////
    // Акустика
    ////////////////////////////////////////////////////////////////////////////

    fn backscatter_engine(&self) -> AdcpResult<AcousticBackscatterEngine> {
        AcousticBackscatterEngine::new(&self.data, &self.config)
    }

    /// Абсолютное обратное рассеяние без маски.
    pub fn raw_backscatter(&mut self) -> AdcpResult<&Array3<f64>> {
        let sv = match self.cache.backscatter.take() {
            Some(sv) => sv,
            None => self
                .backscatter_engine()?
                .absolute_backscatter(&self.data.echo_intensity)?,
        };
        Ok(self.cache.backscatter.insert(sv))
    }

    pub fn absolute_backscatter(&mut self) -> AdcpResult<Array3<f64>> {
        let mask = self.beam_mask()?.clone();
        apply_beam_mask(self.raw_backscatter()?, &mask)
    }

    pub fn signal_to_noise(&mut self) -> AdcpResult<Array3<f64>> {
        let stn = match self.cache.signal_to_noise.take() {
            Some(stn) => stn,
            None => self
                .backscatter_engine()?
                .signal_to_noise(&self.data.echo_intensity)?,
        };
        let stn = self.cache.signal_to_noise.insert(stn).clone();

        apply_beam_mask(&stn, self.beam_mask()?)
    }

    pub fn suspended_sediment(&mut self) -> AdcpResult<Array3<f64>> {
        let sv = self.absolute_backscatter()?;
        self.backscatter_engine()?.suspended_sediment(&sv)
    }

    /// Эхо-сигнал (отсчёты) с маской лучевых данных.
    pub fn echo_intensity(&mut self) -> AdcpResult<Array3<f64>> {
        let echo = self.data.echo_intensity.map(|&v| v as f64);
        apply_beam_mask(&echo, self.beam_mask()?)
    }

    pub fn correlation(&mut self) -> AdcpResult<Array3<f64>> {
        let corr = self.data.correlation.map(|&v| v as f64);
        apply_beam_mask(&corr, self.beam_mask()?)
    }

    ////////////////////////////////////////////////////////////////////////////
    // Геометрия дна
    ////////////////////////////////////////////////////////////////////////////

    /// Вертикальная глубина до дна по лучам, `ансамбль × луч`.
    pub fn adjusted_range(&mut self) -> AdcpResult<&Array2<f64>> {
        let adj = match self.cache.adjusted_range.take() {
            Some(adj) => adj,
            None => self
                .geometry_engine()?
                .adjusted_range(self.data.bottom_track.as_deref())?,
        };
        Ok(self.cache.adjusted_range.insert(adj))
    }

    pub fn mean_seabed_depth(&mut self) -> AdcpResult<Vec<f64>> {
        self.geometry_engine()?
            .mean_depth(self.data.bottom_track.as_deref())
    }

    pub fn seabed_points(&mut self) -> AdcpResult<Array2<[f64; 3]>> {
        self.geometry_engine()?
            .seabed_points(self.data.bottom_track.as_deref())
    }

    pub fn height_above_bed(&mut self) -> AdcpResult<&Array3<f64>> {
        let hab = match self.cache.height_above_bed.take() {
            Some(hab) => hab,
            None => self
                .geometry_engine()?
                .height_above_bed(self.data.bottom_track.as_deref())?,
        };
        Ok(self.cache.height_above_bed.insert(hab))
    }

    ////////////////////////////////////////////////////////////////////////////
    // Маски
    ////////////////////////////////////////////////////////////////////////////

    /// Наклонная дальность до дна, `ансамбль × луч`.
    fn bottom_range(&self) -> Option<Array2<f64>> {
        self.data
            .bottom_track
            .as_ref()
            .map(|bt| Array2::from_fn((bt.len(), 4), |e, b| bt[e].range_m(b)))
    }

    pub fn beam_mask(&mut self) -> AdcpResult<&Array3<bool>> {
        if let Some(mask) = self.cache.beam_mask.take() {
            return Ok(self.cache.beam_mask.insert(mask));
        }

        let sv = if self.config.masking.beam.absolute_backscatter.is_active() {
            Some(self.raw_backscatter()?.clone())
        } else {
            None
        };
        let bottom_range = self.bottom_range();
        let bin_centers = self.data.fixed_leader.bin_centers_m();
        let timestamps = self.data.timestamps();

        let inputs = MaskInputs {
            correlation: &self.data.correlation,
            echo_intensity: &self.data.echo_intensity,
            percent_good: &self.data.percent_good,
            absolute_backscatter: sv.as_ref(),
            horizontal_speed: None,
            error_velocity: None,
            timestamps: &timestamps,
            bottom_range: bottom_range.as_ref(),
            bin_centers: &bin_centers,
            cell_length: self.data.fixed_leader.cell_length_m(),
            beam_angle_deg: self.data.fixed_leader.beam_angle_deg(),
            down_looking: self
                .data
                .fixed_leader
                .system_configuration
                .is_down_looking(),
        };
        let mask = QualityMaskEngine::new(&self.config.masking).beam_mask(&inputs)?;

        Ok(self.cache.beam_mask.insert(mask))
    }

    pub fn velocity_mask(&mut self) -> AdcpResult<&Array2<bool>> {
        if let Some(mask) = self.cache.velocity_mask.take() {
            return Ok(self.cache.velocity_mask.insert(mask));
        }

        let cfg = &self.config.masking.velocity;
        let needs_speed = cfg.speed.is_active();
        let needs_err = cfg.err_vel_min.is_some() || cfg.err_vel_max.is_some();

        // Критерии скорости считаются в земной системе
        let (speed, err_vel) = if needs_speed || needs_err {
            let earth = self.raw_velocity(CoordinateFrame::Earth)?;
            (
                Some(earth.horizontal_speed()?),
                Some(earth.error_velocity()),
            )
        } else {
            (None, None)
        };

        let bottom_range = self.bottom_range();
        let bin_centers = self.data.fixed_leader.bin_centers_m();
        let timestamps = self.data.timestamps();

        let inputs = MaskInputs {
            correlation: &self.data.correlation,
            echo_intensity: &self.data.echo_intensity,
            percent_good: &self.data.percent_good,
            absolute_backscatter: None,
            horizontal_speed: speed.as_ref(),
            error_velocity: err_vel.as_ref(),
            timestamps: &timestamps,
            bottom_range: bottom_range.as_ref(),
            bin_centers: &bin_centers,
            cell_length: self.data.fixed_leader.cell_length_m(),
            beam_angle_deg: self.data.fixed_leader.beam_angle_deg(),
            down_looking: self
                .data
                .fixed_leader
                .system_configuration
                .is_down_looking(),
        };
        let mask = QualityMaskEngine::new(&self.config.masking).velocity_mask(&inputs)?;

        Ok(self.cache.velocity_mask.insert(mask))
    }

    /// Произвольный массив `ансамбль × ячейка` через маску скоростей.
    pub fn apply_velocity_mask(
        &mut self,
        data: &Array2<f64>,
    ) -> AdcpResult<Array2<f64>> {
        apply_velocity_mask(data, self.velocity_mask()?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use adcp_core::Pd0Builder;
    use adcp_types::{AdcpError, Series};
    use approx::assert_relative_eq;

    use super::*;
    use crate::config::{BottomExclusion, Bounds, ErrVelMax};

    fn survey(builder: &Pd0Builder, n: usize) -> Survey {
        let data = Pd0Reader::new(Cursor::new(builder.build(n).unwrap()))
            .unwrap()
            .read_all()
            .unwrap();
        Survey::new(data, ProcessingConfig::default()).unwrap()
    }

    #[test]
    fn test_earth_native_is_pass_through() {
        let mut s = survey(&Pd0Builder::new(20, 4).with_frame(3), 10);
        let raw = s.data().velocity_m_s();
        let earth = s.velocity(CoordinateFrame::Earth).unwrap();

        assert_eq!(earth.data, raw);
        assert!(matches!(
            s.velocity(CoordinateFrame::Ship),
            Err(AdcpError::UnsupportedTransform { .. })
        ));
    }

    #[test]
    fn test_no_bottom_track_gives_nan_geometry() {
        let mut s = survey(&Pd0Builder::new(20, 4), 10);

        let hab = s.height_above_bed().unwrap();
        assert_eq!(hab.shape(), (10, 20, 4));
        assert!(hab.iter().all(|v| v.is_nan()));

        let adj = s.adjusted_range().unwrap();
        assert_eq!(adj.shape(), (10, 4));
        assert!(adj.iter().all(|v| v.is_nan()));

        // Исключение у дна без донного трекинга ничего не исключает
        let mut cfg = ProcessingConfig::default();
        cfg.masking.velocity.bottom = BottomExclusion {
            enabled: true,
            offset_bins: 0.0,
        };
        s.set_config(cfg).unwrap();
        assert!(s.velocity_mask().unwrap().iter().all(|&m| !m));
    }

    #[test]
    fn test_bottom_track_geometry() {
        let mut s = survey(&Pd0Builder::new(20, 4).with_bottom_track([1000; 4]), 3);
        let depth = s.mean_seabed_depth().unwrap();
        assert_relative_eq!(depth[0], 10.0 * 20f64.to_radians().cos(), epsilon = 1e-9);

        let hab = s.height_above_bed().unwrap();
        assert!(hab[(0, 0, 0)] > 0.0);
    }

    #[test]
    fn test_config_change_invalidates_masks() {
        let mut s = survey(&Pd0Builder::new(20, 4), 5);
        assert!(s.beam_mask().unwrap().iter().all(|&m| !m));

        // Эхо генератора: 200 − 4·ячейка
        let mut cfg = ProcessingConfig::default();
        cfg.masking.beam.echo_intensity = Bounds::new(Some(150.0), None);
        s.set_config(cfg).unwrap();

        let mask = s.beam_mask().unwrap();
        assert!(!mask[(0, 12, 0)]);
        assert!(mask[(0, 13, 0)]);

        let echo = s.echo_intensity().unwrap();
        assert_eq!(echo.shape(), (5, 20, 4));
        assert!(echo[(2, 19, 1)].is_nan());
        assert_eq!(echo[(2, 0, 1)], 200.0);
    }

    #[test]
    fn test_velocity_mask_applied_on_read() {
        let builder = Pd0Builder::new(8, 4).with_frame(3).with_velocity(|e, c, b| {
            if b == 3 && (e + c) % 2 == 0 {
                100
            } else {
                -50
            }
        });
        let mut s = survey(&builder, 6);
        let mut cfg = ProcessingConfig::default();
        cfg.masking.velocity.err_vel_max = Some(ErrVelMax::Value(0.0));
        s.set_config(cfg).unwrap();

        let raw = s.raw_velocity(CoordinateFrame::Earth).unwrap().clone();
        let masked = s.velocity(CoordinateFrame::Earth).unwrap();
        for e in 0..6 {
            for c in 0..8 {
                let excluded = raw.data[(e, c, 3)] > 0.0;
                assert_eq!(masked.data[(e, c, 0)].is_nan(), excluded);
            }
        }
        // Исходные данные не изменяются
        assert_eq!(s.data().velocity_m_s(), raw.data);
    }

    #[test]
    fn test_navigation_length_checked() {
        let mut s = survey(&Pd0Builder::new(4, 4), 5);
        let nav = Navigation {
            heading: Some(Series::Variable(vec![0.0; 4])),
            ..Navigation::default()
        };
        assert!(matches!(
            s.set_navigation(Some(nav)),
            Err(AdcpError::Configuration(_))
        ));
    }

    #[test]
    fn test_navigation_heading_rotates_velocity() {
        let builder = Pd0Builder::new(4, 4)
            .with_frame(1)
            .with_velocity(|_, _, b| if b == 1 { 500 } else { 0 });
        let mut s = survey(&builder, 3);
        s.set_navigation(Some(Navigation {
            heading: Some(Series::Constant(90.0)),
            ..Navigation::default()
        }))
        .unwrap();

        let earth = s.raw_velocity(CoordinateFrame::Earth).unwrap();
        assert_relative_eq!(earth.data[(1, 2, 0)], 0.5, epsilon = 1e-9);
        assert_relative_eq!(earth.data[(1, 2, 1)], 0.0, epsilon = 1e-9);
        assert_relative_eq!(s.direction(CoordinateFrame::Earth).unwrap()[(0, 0)], 90.0, epsilon = 1e-9);
    }
}
