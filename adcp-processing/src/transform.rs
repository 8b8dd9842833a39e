//! Преобразование скоростей между системами координат.
//!
//! Цепочка только прямая: `Beam -> Instrument -> Ship -> Earth`. Матрица
//! поворота строится один раз на ансамбль и применяется ко всем ячейкам.

use adcp_types::{
    scale_velocity, AdcpError, AdcpResult, Array2, Array3, BeamPattern, BottomTrack,
    CoordinateFrame, FixedLeader,
};
use log::debug;

use crate::{
    navigation::Attitude,
    rotation::{Matrix3, Matrix4},
};

/// Число компонент скорости: три оси и скорость ошибки.
pub const N_COMPONENTS: usize = 4;

/// Скорости в одной системе координат, `ансамбль × ячейка × компонента`, м/с.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityField {
    pub frame: CoordinateFrame,
    pub data: Array3<f64>,
}

impl VelocityField {
    /// Поле из отсчётов PD0 (мм/с). Маркер отсутствия данных становится NaN.
    pub fn from_raw(
        raw: &Array3<i16>,
        frame: CoordinateFrame,
    ) -> AdcpResult<Self> {
        let (_, _, n_beams) = raw.shape();
        if n_beams != N_COMPONENTS {
            return Err(AdcpError::invalid_geometry(format!(
                "velocity transforms need 4 beams, got {n_beams}"
            )));
        }

        Ok(Self {
            frame,
            data: raw.map(|&v| scale_velocity(v)),
        })
    }

    /// Скорости донного трекинга как поле с одной ячейкой.
    pub fn from_bottom_track(
        bottom_track: &[BottomTrack],
        frame: CoordinateFrame,
    ) -> Self {
        let data = Array3::from_fn((bottom_track.len(), 1, N_COMPONENTS), |e, _, k| {
            bottom_track[e].velocity_m_s(k)
        });
        Self { frame, data }
    }

    pub fn n_ensembles(&self) -> usize {
        self.data.shape().0
    }

    pub fn n_cells(&self) -> usize {
        self.data.shape().1
    }

    /// Одна компонента, `ансамбль × ячейка`.
    pub fn component(
        &self,
        k: usize,
    ) -> Array2<f64> {
        let (n_ens, n_cells, _) = self.data.shape();
        Array2::from_fn((n_ens, n_cells), |e, c| self.data[(e, c, k)])
    }

    pub fn error_velocity(&self) -> Array2<f64> {
        self.component(3)
    }

    /// Горизонтальная скорость `hypot(c0, c1)`.
    pub fn horizontal_speed(&self) -> AdcpResult<Array2<f64>> {
        self.require_vector_frame()?;
        let (n_ens, n_cells, _) = self.data.shape();
        Ok(Array2::from_fn((n_ens, n_cells), |e, c| {
            self.data[(e, c, 0)].hypot(self.data[(e, c, 1)])
        }))
    }

    /// Направление в градусах от второй горизонтальной оси по часовой
    /// стрелке, в диапазоне `[0, 360)`.
    pub fn direction(&self) -> AdcpResult<Array2<f64>> {
        self.require_vector_frame()?;
        let (n_ens, n_cells, _) = self.data.shape();
        Ok(Array2::from_fn((n_ens, n_cells), |e, c| {
            direction_deg(self.data[(e, c, 0)], self.data[(e, c, 1)])
        }))
    }

    /// Скользящее среднее по ансамблям (центрированное окно, NaN
    /// пропускаются). Скорость и направление считаются заново по
    /// сглаженным компонентам.
    pub fn moving_average(
        &self,
        window: usize,
    ) -> AdcpResult<Self> {
        if window == 0 {
            return Err(AdcpError::configuration("averaging window must be positive"));
        }

        let (n_ens, n_cells, n_comp) = self.data.shape();
        let half = window / 2;
        let data = Array3::from_fn((n_ens, n_cells, n_comp), |e, c, k| {
            let lo = e.saturating_sub(half);
            let hi = (e + window - half).min(n_ens);
            let (sum, n) = (lo..hi)
                .map(|i| self.data[(i, c, k)])
                .filter(|v| v.is_finite())
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));

            if n == 0 {
                f64::NAN
            } else {
                sum / n as f64
            }
        });

        Ok(Self {
            frame: self.frame,
            data,
        })
    }

    fn require_vector_frame(&self) -> AdcpResult<()> {
        if self.frame == CoordinateFrame::Beam {
            return Err(AdcpError::configuration(
                "speed and direction are undefined for beam velocities",
            ));
        }
        Ok(())
    }
}

/// Направление вектора `(east, north)` в градусах, `[0, 360)`.
pub fn direction_deg(
    east: f64,
    north: f64,
) -> f64 {
    let d = east.atan2(north).to_degrees().rem_euclid(360.0);
    // rem_euclid может вернуть ровно 360 для -0.0 с округлением
    if d >= 360.0 {
        0.0
    } else {
        d
    }
}

/// Матрица `beam -> instrument` для 4-лучевой схемы Janus.
///
/// ```text
/// X = c·a·(b1 − b2)    Y = c·a·(b4 − b3)
/// Z = b·(b1 + b2 + b3 + b4)
/// E = d·(b1 + b2 − b3 − b4)
/// ```
/// где `a = 1/(2 sin θ)`, `b = 1/(4 cos θ)`, `d = a/√2`, `c`: знак схемы.
pub fn beam_to_instrument_matrix(
    beam_angle_deg: f64,
    pattern: BeamPattern,
) -> AdcpResult<Matrix4> {
    let valid = beam_angle_deg > 0.0 && beam_angle_deg < 90.0;
    if !valid {
        return Err(AdcpError::invalid_geometry(format!(
            "beam angle must be in (0, 90) degrees, got {beam_angle_deg}"
        )));
    }

    let theta = beam_angle_deg.to_radians();
    let c = pattern.sign();
    let a = 1.0 / (2.0 * theta.sin());
    let b = 1.0 / (4.0 * theta.cos());
    let d = a / std::f64::consts::SQRT_2;

    Ok(Matrix4 {
        m: [
            [c * a, -c * a, 0.0, 0.0],
            [0.0, 0.0, -c * a, c * a],
            [b, b, b, b],
            [d, d, -d, -d],
        ],
    })
}

/// Преобразователь скоростей одного файла.
#[derive(Debug, Clone)]
pub struct CoordinateTransformEngine {
    beam_angle_deg: f64,
    pattern: BeamPattern,
    attitude: Attitude,
}

impl CoordinateTransformEngine {
    /// Геометрия берётся из фиксированного лидера. Неизвестная схема
    /// лучей считается выпуклой.
    pub fn new(
        fixed_leader: &FixedLeader,
        attitude: Attitude,
    ) -> Self {
        let pattern = fixed_leader
            .system_configuration
            .beam_pattern
            .unwrap_or(BeamPattern::Convex);

        Self {
            beam_angle_deg: fixed_leader.beam_angle_deg(),
            pattern,
            attitude,
        }
    }

    pub fn attitude(&self) -> &Attitude {
        &self.attitude
    }

    pub fn beam_matrix(&self) -> AdcpResult<Matrix4> {
        beam_to_instrument_matrix(self.beam_angle_deg, self.pattern)
    }

    /// Переводит поле в систему `to`. Запрос исходной системы возвращает
    /// копию без изменений.
    pub fn transform(
        &self,
        field: &VelocityField,
        to: CoordinateFrame,
    ) -> AdcpResult<VelocityField> {
        let from = field.frame;
        if to < from {
            return Err(AdcpError::unsupported(from, to));
        }
        if to == from {
            return Ok(field.clone());
        }
        if field.n_ensembles() != self.attitude.len() {
            return Err(AdcpError::configuration(format!(
                "attitude has {} ensembles, velocity has {}",
                self.attitude.len(),
                field.n_ensembles()
            )));
        }

        debug!("Transforming velocities {from} -> {to}");

        let mut current = field.clone();
        if current.frame == CoordinateFrame::Beam {
            current = self.beam_to_instrument(&current)?;
        }
        if current.frame == to {
            return Ok(current);
        }

        // Instrument -> Earth одной матрицей: heading·tilt
        if current.frame == CoordinateFrame::Instrument && to == CoordinateFrame::Earth {
            return Ok(self.rotate(&current, to, |e| self.earth_rotation(e)));
        }

        if current.frame == CoordinateFrame::Instrument {
            current = self.rotate(&current, CoordinateFrame::Ship, |e| self.tilt_rotation(e));
        }
        if current.frame == to {
            return Ok(current);
        }

        Ok(self.rotate(&current, CoordinateFrame::Earth, |e| {
            Matrix3::heading(self.attitude.heading[e])
        }))
    }

    /// Скорости донного трекинга в системе `to`, `ансамбль × компонента`.
    pub fn transform_bottom_track(
        &self,
        bottom_track: &[BottomTrack],
        from: CoordinateFrame,
        to: CoordinateFrame,
    ) -> AdcpResult<Array2<f64>> {
        let field = VelocityField::from_bottom_track(bottom_track, from);
        let out = self.transform(&field, to)?;
        Ok(Array2::from_fn((out.n_ensembles(), N_COMPONENTS), |e, k| {
            out.data[(e, 0, k)]
        }))
    }

    fn beam_to_instrument(
        &self,
        field: &VelocityField,
    ) -> AdcpResult<VelocityField> {
        let m = self.beam_matrix()?;
        let mut data = field.data.clone();
        let (n_ens, n_cells, _) = data.shape();

        for e in 0..n_ens {
            for c in 0..n_cells {
                let lane = data.lane_mut(e, c);
                let out = m.mul_vec([lane[0], lane[1], lane[2], lane[3]]);
                lane.copy_from_slice(&out);
            }
        }

        Ok(VelocityField {
            frame: CoordinateFrame::Instrument,
            data,
        })
    }

    /// Поворот первых трёх компонент; скорость ошибки не меняется.
    fn rotate<F>(
        &self,
        field: &VelocityField,
        to: CoordinateFrame,
        rotation: F,
    ) -> VelocityField
    where
        F: Fn(usize) -> Matrix3,
    {
        let mut data = field.data.clone();
        let (n_ens, n_cells, _) = data.shape();

        for e in 0..n_ens {
            let r = rotation(e);
            for c in 0..n_cells {
                let lane = data.lane_mut(e, c);
                let v = r.mul_vec([lane[0], lane[1], lane[2]]);
                lane[..3].copy_from_slice(&v);
            }
        }

        VelocityField { frame: to, data }
    }

    fn tilt_rotation(
        &self,
        e: usize,
    ) -> Matrix3 {
        Matrix3::attitude(0.0, self.attitude.pitch[e], self.attitude.roll[e])
    }

    fn earth_rotation(
        &self,
        e: usize,
    ) -> Matrix3 {
        Matrix3::attitude(
            self.attitude.heading[e],
            self.attitude.pitch[e],
            self.attitude.roll[e],
        )
    }
}

#[cfg(test)]
mod tests {
    use adcp_types::{BeamFacing, SystemConfiguration};
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    fn leader(angle: u8) -> FixedLeader {
        FixedLeader {
            n_beams: 4,
            n_cells: 3,
            beam_angle: angle,
            system_configuration: SystemConfiguration {
                beam_facing: Some(BeamFacing::Down),
                beam_pattern: Some(BeamPattern::Convex),
                ..SystemConfiguration::undefined()
            },
            ..FixedLeader::default()
        }
    }

    fn attitude(
        n: usize,
        heading: f64,
        pitch: f64,
        roll: f64,
    ) -> Attitude {
        Attitude {
            heading: vec![heading; n],
            pitch: vec![pitch; n],
            roll: vec![roll; n],
        }
    }

    fn random_field(
        frame: CoordinateFrame,
        seed: u64,
    ) -> VelocityField {
        let mut rng = StdRng::seed_from_u64(seed);
        VelocityField {
            frame,
            data: Array3::from_fn((5, 3, 4), |_, _, _| rng.gen_range(-2.0..2.0)),
        }
    }

    #[test]
    fn test_beam_matrix_matches_hand_computed() {
        let m = beam_to_instrument_matrix(30.0, BeamPattern::Convex).unwrap();
        // sin 30° = 0.5 => a = 1
        assert_relative_eq!(m.m[0][0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(m.m[0][1], -1.0, epsilon = 1e-12);
        assert_relative_eq!(m.m[1][2], -1.0, epsilon = 1e-12);
        assert_relative_eq!(m.m[1][3], 1.0, epsilon = 1e-12);
        assert_relative_eq!(m.m[2][0], 1.0 / (4.0 * 30f64.to_radians().cos()), epsilon = 1e-12);
        assert_relative_eq!(m.m[3][2], -1.0 / 2f64.sqrt(), epsilon = 1e-12);

        let concave = beam_to_instrument_matrix(30.0, BeamPattern::Concave).unwrap();
        assert_relative_eq!(concave.m[0][0], -1.0, epsilon = 1e-12);
        assert_relative_eq!(concave.m[2][0], m.m[2][0]);
    }

    #[test]
    fn test_zero_beam_angle_is_invalid_geometry() {
        let err = beam_to_instrument_matrix(0.0, BeamPattern::Convex).err().unwrap();
        assert!(matches!(err, AdcpError::InvalidGeometry(_)));

        let engine = CoordinateTransformEngine::new(&leader(0), attitude(5, 0.0, 0.0, 0.0));
        let err = engine
            .transform(&random_field(CoordinateFrame::Beam, 1), CoordinateFrame::Instrument)
            .err()
            .unwrap();
        assert!(matches!(err, AdcpError::InvalidGeometry(_)));
    }

    #[test]
    fn test_beam_instrument_round_trip() {
        let engine = CoordinateTransformEngine::new(&leader(20), attitude(5, 0.0, 0.0, 0.0));
        let beams = random_field(CoordinateFrame::Beam, 7);
        let inst = engine.transform(&beams, CoordinateFrame::Instrument).unwrap();
        let inv = engine.beam_matrix().unwrap().inverse().unwrap();

        for e in 0..5 {
            for c in 0..3 {
                let l = inst.data.lane(e, c);
                let back = inv.mul_vec([l[0], l[1], l[2], l[3]]);
                for (k, v) in back.iter().enumerate() {
                    assert_relative_eq!(*v, beams.data[(e, c, k)], epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_native_frame_is_pass_through() {
        let engine = CoordinateTransformEngine::new(&leader(20), attitude(5, 45.0, 3.0, 1.0));
        let field = random_field(CoordinateFrame::Earth, 3);
        assert_eq!(engine.transform(&field, CoordinateFrame::Earth).unwrap(), field);
    }

    #[test]
    fn test_backward_transform_is_unsupported() {
        let engine = CoordinateTransformEngine::new(&leader(20), attitude(5, 0.0, 0.0, 0.0));
        let err = engine
            .transform(&random_field(CoordinateFrame::Earth, 3), CoordinateFrame::Ship)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AdcpError::UnsupportedTransform {
                from: CoordinateFrame::Earth,
                to: CoordinateFrame::Ship
            }
        ));
    }

    #[test]
    fn test_chain_via_ship_matches_direct_earth() {
        let engine = CoordinateTransformEngine::new(&leader(20), attitude(5, 210.0, 4.0, -6.0));
        let inst = random_field(CoordinateFrame::Instrument, 11);

        let direct = engine.transform(&inst, CoordinateFrame::Earth).unwrap();
        let ship = engine.transform(&inst, CoordinateFrame::Ship).unwrap();
        let chained = engine.transform(&ship, CoordinateFrame::Earth).unwrap();

        for (a, b) in direct.data.iter().zip(chained.data.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
        // Скорость ошибки не меняется поворотами
        assert_eq!(direct.error_velocity(), inst.error_velocity());
    }

    #[test]
    fn test_heading_rotates_forward_to_east() {
        let engine = CoordinateTransformEngine::new(&leader(20), attitude(1, 90.0, 0.0, 0.0));
        let field = VelocityField {
            frame: CoordinateFrame::Instrument,
            data: Array3::from_fn((1, 1, 4), |_, _, k| if k == 1 { 1.0 } else { 0.0 }),
        };
        let earth = engine.transform(&field, CoordinateFrame::Earth).unwrap();
        assert_relative_eq!(earth.data[(0, 0, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(earth.data[(0, 0, 1)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(earth.direction().unwrap()[(0, 0)], 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_direction_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let d = direction_deg(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
            assert!((0.0..360.0).contains(&d), "direction {d} out of range");
        }
        assert_eq!(direction_deg(-0.0, 1.0), 0.0);
        assert_eq!(direction_deg(-1e-300, 1.0), 0.0);
        assert_relative_eq!(direction_deg(-1.0, 0.0), 270.0);
    }

    #[test]
    fn test_from_raw_requires_four_beams() {
        let raw = Array3::from_elem((2, 3, 3), 0i16);
        assert!(matches!(
            VelocityField::from_raw(&raw, CoordinateFrame::Beam),
            Err(AdcpError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_moving_average_recomputes_direction() {
        // Северная и восточная скорости: среднее направление 45°, а не
        // среднее от 0° и 90°
        let field = VelocityField {
            frame: CoordinateFrame::Earth,
            data: Array3::from_fn((2, 1, 4), |e, _, k| match (e, k) {
                (0, 1) | (1, 0) => 1.0,
                _ => 0.0,
            }),
        };
        let avg = field.moving_average(2).unwrap();
        assert_relative_eq!(avg.direction().unwrap()[(1, 0)], 45.0, epsilon = 1e-9);
        assert_relative_eq!(avg.horizontal_speed().unwrap()[(1, 0)], 0.5f64.hypot(0.5));
        assert!(field.moving_average(0).is_err());
    }

    #[test]
    fn test_bottom_track_uses_same_chain() {
        let engine = CoordinateTransformEngine::new(&leader(30), attitude(2, 0.0, 0.0, 0.0));
        let bt = vec![
            BottomTrack {
                velocity: [500, 0, 0, 0],
                ..BottomTrack::default()
            };
            2
        ];
        let inst = engine
            .transform_bottom_track(&bt, CoordinateFrame::Beam, CoordinateFrame::Instrument)
            .unwrap();
        assert_eq!(inst.shape(), (2, 4));
        assert_relative_eq!(inst[(1, 0)], 0.5, epsilon = 1e-12);
    }
}
