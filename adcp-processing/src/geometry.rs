//! Геометрия лучей и донного трекинга.
//!
//! Поворот платформы `R = Rz(yaw)·Rx(pitch)·Ry(roll)`, где
//! `yaw = −(heading + crp_rotation)`. Оси: X: правый борт, Y: нос, Z: вверх.

use adcp_types::{AdcpError, AdcpResult, Array2, Array3, BottomTrack, FixedLeader};

use crate::{
    config::{GeometryConfig, PlatformConfig},
    navigation::{Attitude, Positions},
    rotation::Matrix3,
};

type Point = [f64; 3];

const NAN_POINT: Point = [f64::NAN; 3];

/// Единичный вектор луча в системе прибора (схема Janus, 4 луча).
///
/// Лучи 1/2 лежат в плоскости XZ, лучи 3/4 в плоскости YZ; `facing` равен
/// −1 для прибора, смотрящего вниз, и +1 для смотрящего вверх.
pub fn beam_unit_vector(
    beam: usize,
    beam_angle_deg: f64,
    facing: f64,
) -> AdcpResult<Point> {
    let (s, c) = beam_angle_deg.to_radians().sin_cos();
    let z = facing * c;
    match beam {
        0 => Ok([s, 0.0, z]),
        1 => Ok([-s, 0.0, z]),
        2 => Ok([0.0, s, z]),
        3 => Ok([0.0, -s, z]),
        _ => Err(AdcpError::invalid_geometry(format!(
            "beam index {beam} outside 4-beam layout"
        ))),
    }
}

/// Геометрия одного файла: прибор, ориентация и положение по ансамблям.
#[derive(Debug, Clone)]
pub struct BottomTrackGeometryEngine {
    beam_angle_deg: f64,
    down_looking: bool,
    bin_centers: Vec<f64>,
    attitude: Attitude,
    positions: Positions,
    platform: PlatformConfig,
    clamp_hab: bool,
}

impl BottomTrackGeometryEngine {
    pub fn new(
        fixed_leader: &FixedLeader,
        attitude: Attitude,
        positions: Positions,
        platform: &PlatformConfig,
        geometry: &GeometryConfig,
    ) -> AdcpResult<Self> {
        if fixed_leader.n_beams != 4 {
            return Err(AdcpError::invalid_geometry(format!(
                "geometry needs 4 beams, got {}",
                fixed_leader.n_beams
            )));
        }
        if attitude.len() != positions.x.len() {
            return Err(AdcpError::configuration(format!(
                "attitude has {} ensembles, positions have {}",
                attitude.len(),
                positions.x.len()
            )));
        }

        Ok(Self {
            beam_angle_deg: fixed_leader.beam_angle_deg(),
            down_looking: fixed_leader.system_configuration.is_down_looking(),
            bin_centers: fixed_leader.bin_centers_m(),
            attitude,
            positions,
            platform: platform.clone(),
            clamp_hab: geometry.clamp_hab,
        })
    }

    pub fn n_ensembles(&self) -> usize {
        self.attitude.len()
    }

    fn facing(&self) -> f64 {
        if self.down_looking {
            -1.0
        } else {
            1.0
        }
    }

    /// Поворот платформы для ансамбля `e`.
    pub fn rotation(
        &self,
        e: usize,
    ) -> Matrix3 {
        let yaw = -(self.attitude.heading[e] + self.platform.crp_rotation).to_radians();
        Matrix3::rotation_z(yaw)
            .mul_mat(&Matrix3::rotation_x(self.attitude.pitch[e].to_radians()))
            .mul_mat(&Matrix3::rotation_y(self.attitude.roll[e].to_radians()))
    }

    /// Повёрнутые единичные векторы четырёх лучей.
    fn beam_vectors(
        &self,
        e: usize,
    ) -> AdcpResult<[Point; 4]> {
        let r = self.rotation(e);
        let mut out = [[0.0; 3]; 4];
        for (b, v) in out.iter_mut().enumerate() {
            *v = r.mul_vec(beam_unit_vector(b, self.beam_angle_deg, self.facing())?);
        }
        Ok(out)
    }

    /// Смещения середин ячеек по лучам относительно прибора (без поворота),
    /// `ячейка × луч`.
    pub fn bin_offsets(&self) -> AdcpResult<Array2<Point>> {
        let cos = self.beam_angle_deg.to_radians().cos();
        let mut units = [[0.0; 3]; 4];
        for (b, u) in units.iter_mut().enumerate() {
            *u = beam_unit_vector(b, self.beam_angle_deg, self.facing())?;
        }

        Ok(Array2::from_fn((self.bin_centers.len(), 4), |c, b| {
            let along = self.bin_centers[c] / cos;
            units[b].map(|v| v * along)
        }))
    }

    /// Географические координаты середин ячеек, `ансамбль × ячейка × луч`.
    pub fn bin_positions(&self) -> AdcpResult<Array3<Point>> {
        let n_ens = self.n_ensembles();
        let cos = self.beam_angle_deg.to_radians().cos();
        let mut vectors = Vec::with_capacity(n_ens);
        for e in 0..n_ens {
            vectors.push((self.origin(e), self.beam_vectors(e)?));
        }

        Ok(Array3::from_fn((n_ens, self.bin_centers.len(), 4), |e, c, b| {
            let (origin, beams) = &vectors[e];
            let along = self.bin_centers[c] / cos;
            add(*origin, beams[b].map(|v| v * along))
        }))
    }

    /// Начало лучей: положение CRP плюс повёрнутое смещение прибора.
    fn origin(
        &self,
        e: usize,
    ) -> Point {
        let offset = self.rotation(e).mul_vec(self.platform.crp_offset);
        add(self.positions.at(e), offset)
    }

    fn has_bottom(
        &self,
        bottom_track: Option<&[BottomTrack]>,
    ) -> bool {
        self.down_looking && bottom_track.is_some_and(|bt| bt.len() == self.n_ensembles())
    }

    /// Вертикальная глубина до дна по лучам с учётом наклона,
    /// `ансамбль × луч`, м.
    pub fn adjusted_range(
        &self,
        bottom_track: Option<&[BottomTrack]>,
    ) -> AdcpResult<Array2<f64>> {
        let n_ens = self.n_ensembles();
        let mut out = Array2::from_elem((n_ens, 4), f64::NAN);

        let Some(bt) = bottom_track.filter(|_| self.has_bottom(bottom_track)) else {
            return Ok(out);
        };

        for (e, track) in bt.iter().enumerate() {
            let beams = self.beam_vectors(e)?;
            for (b, u) in beams.iter().enumerate() {
                out[(e, b)] = track.range_m(b) * u[2].abs();
            }
        }
        Ok(out)
    }

    /// Средняя по лучам глубина до дна; NaN, если ни один луч не дал дна.
    pub fn mean_depth(
        &self,
        bottom_track: Option<&[BottomTrack]>,
    ) -> AdcpResult<Vec<f64>> {
        let adjusted = self.adjusted_range(bottom_track)?;
        Ok((0..self.n_ensembles())
            .map(|e| nan_mean(adjusted.row(e)))
            .collect())
    }

    /// Точки пересечения лучей с дном, `ансамбль × луч`.
    pub fn seabed_points(
        &self,
        bottom_track: Option<&[BottomTrack]>,
    ) -> AdcpResult<Array2<Point>> {
        let n_ens = self.n_ensembles();
        let Some(bt) = bottom_track.filter(|_| self.has_bottom(bottom_track)) else {
            return Ok(Array2::from_fn((n_ens, 4), |_, _| NAN_POINT));
        };

        let mut rows = Vec::with_capacity(n_ens);
        for (e, track) in bt.iter().enumerate() {
            let origin = self.origin(e);
            let beams = self.beam_vectors(e)?;
            rows.push(std::array::from_fn::<Point, 4, _>(|b| {
                let range = track.range_m(b);
                add(origin, beams[b].map(|v| v * range))
            }));
        }

        Ok(Array2::from_fn((n_ens, 4), |e, b| rows[e][b]))
    }

    /// Высота над дном для каждой ячейки и луча, `ансамбль × ячейка × луч`.
    pub fn height_above_bed(
        &self,
        bottom_track: Option<&[BottomTrack]>,
    ) -> AdcpResult<Array3<f64>> {
        let n_ens = self.n_ensembles();
        let n_cells = self.bin_centers.len();
        let shape = (n_ens, n_cells, 4);

        if !self.has_bottom(bottom_track) {
            return Ok(Array3::from_elem(shape, f64::NAN));
        }

        let adjusted = self.adjusted_range(bottom_track)?;
        let cos = self.beam_angle_deg.to_radians().cos();
        let mut tilt = Vec::with_capacity(n_ens);
        for e in 0..n_ens {
            tilt.push(self.beam_vectors(e)?.map(|u| u[2].abs()));
        }

        Ok(Array3::from_fn(shape, |e, c, b| {
            let bin_depth = self.bin_centers[c] / cos * tilt[e][b];
            let hab = adjusted[(e, b)] - bin_depth;
            if self.clamp_hab && hab < 0.0 {
                f64::NAN
            } else {
                hab
            }
        }))
    }
}

fn add(
    a: Point,
    b: Point,
) -> Point {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn nan_mean(values: &[f64]) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use adcp_types::{BeamFacing, SystemConfiguration};
    use approx::assert_relative_eq;

    use super::*;

    fn leader(facing: BeamFacing) -> FixedLeader {
        FixedLeader {
            n_beams: 4,
            n_cells: 10,
            cell_length_cm: 100,
            bin1_distance_cm: 200,
            beam_angle: 30,
            system_configuration: SystemConfiguration {
                beam_facing: Some(facing),
                ..SystemConfiguration::undefined()
            },
            ..FixedLeader::default()
        }
    }

    fn level(n: usize) -> Attitude {
        Attitude {
            heading: vec![0.0; n],
            pitch: vec![0.0; n],
            roll: vec![0.0; n],
        }
    }

    fn engine(
        facing: BeamFacing,
        attitude: Attitude,
        geometry: GeometryConfig,
    ) -> BottomTrackGeometryEngine {
        let n = attitude.len();
        BottomTrackGeometryEngine::new(
            &leader(facing),
            attitude,
            Positions::origin(n),
            &PlatformConfig::default(),
            &geometry,
        )
        .unwrap()
    }

    fn track(range_cm: u16) -> BottomTrack {
        BottomTrack {
            range_lsb: [range_cm; 4],
            ..BottomTrack::default()
        }
    }

    #[test]
    fn test_level_vertical_depth() {
        let eng = engine(BeamFacing::Down, level(2), GeometryConfig::default());
        let bt = vec![track(1000); 2];
        let adj = eng.adjusted_range(Some(bt.as_slice())).unwrap();

        let expected = 10.0 * 30f64.to_radians().cos();
        for b in 0..4 {
            assert_relative_eq!(adj[(1, b)], expected, epsilon = 1e-9);
        }
        assert_relative_eq!(eng.mean_depth(Some(bt.as_slice())).unwrap()[0], expected, epsilon = 1e-9);
    }

    #[test]
    fn test_pitch_changes_beam_depths() {
        let att = Attitude {
            pitch: vec![10.0],
            ..level(1)
        };
        let eng = engine(BeamFacing::Down, att, GeometryConfig::default());
        let adj = eng.adjusted_range(Some(&[track(1000)][..])).unwrap();

        // Лучи 3/4 лежат в плоскости тангажа и расходятся
        assert!((adj[(0, 2)] - adj[(0, 3)]).abs() > 0.1);
        assert_relative_eq!(adj[(0, 0)], adj[(0, 1)], epsilon = 1e-9);
    }

    #[test]
    fn test_no_bottom_track_is_all_nan() {
        let eng = engine(BeamFacing::Down, level(3), GeometryConfig::default());

        let hab = eng.height_above_bed(None).unwrap();
        assert_eq!(hab.shape(), (3, 10, 4));
        assert!(hab.iter().all(|v| v.is_nan()));

        let adj = eng.adjusted_range(None).unwrap();
        assert_eq!(adj.shape(), (3, 4));
        assert!(adj.iter().all(|v| v.is_nan()));

        let points = eng.seabed_points(None).unwrap();
        assert!(points.iter().flatten().all(|v| v.is_nan()));
    }

    #[test]
    fn test_up_looking_is_all_nan() {
        let eng = engine(BeamFacing::Up, level(2), GeometryConfig::default());
        let bt = vec![track(1000); 2];
        assert!(eng.height_above_bed(Some(bt.as_slice())).unwrap().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_height_above_bed_and_clamp() {
        let bt = vec![track(1000)];
        let eng = engine(BeamFacing::Down, level(1), GeometryConfig::default());
        let hab = eng.height_above_bed(Some(bt.as_slice())).unwrap();

        // Глубина дна 10·cos30 ≈ 8.66; центр первой ячейки 2 м
        assert_relative_eq!(hab[(0, 0, 0)], 10.0 * 30f64.to_radians().cos() - 2.0, epsilon = 1e-9);
        assert!(hab[(0, 9, 0)] < 0.0);

        let clamped = engine(BeamFacing::Down, level(1), GeometryConfig { clamp_hab: true });
        let hab = clamped.height_above_bed(Some(bt.as_slice())).unwrap();
        assert!(hab[(0, 9, 0)].is_nan());
        assert!(hab.iter().filter(|v| v.is_finite()).all(|&v| v >= 0.0));
    }

    #[test]
    fn test_seabed_points_follow_heading_and_offset() {
        let att = Attitude {
            heading: vec![90.0],
            ..level(1)
        };
        let eng = BottomTrackGeometryEngine::new(
            &leader(BeamFacing::Down),
            att,
            Positions {
                x: vec![100.0],
                y: vec![200.0],
                z: vec![0.0],
            },
            &PlatformConfig {
                crp_offset: [0.0, 1.0, 0.0],
                crp_rotation: 0.0,
            },
            &GeometryConfig::default(),
        )
        .unwrap();

        let points = eng.seabed_points(Some(&[track(1000)][..])).unwrap();
        // Нос на восток: смещение (0, 1, 0) и луч 3 уходят в +X
        let p = points[(0, 2)];
        let horiz = 10.0 * 30f64.to_radians().sin();
        assert_relative_eq!(p[0], 100.0 + 1.0 + horiz, epsilon = 1e-9);
        assert_relative_eq!(p[1], 200.0, epsilon = 1e-9);
        assert_relative_eq!(p[2], -10.0 * 30f64.to_radians().cos(), epsilon = 1e-9);
    }

    #[test]
    fn test_missing_detection_is_nan() {
        let eng = engine(BeamFacing::Down, level(1), GeometryConfig::default());
        let mut bt = track(1000);
        bt.range_lsb[1] = 0;
        let adj = eng.adjusted_range(Some(&[bt][..])).unwrap();
        assert!(adj[(0, 1)].is_nan());
        assert!(adj[(0, 0)].is_finite());
    }

    #[test]
    fn test_bin_offsets_level() {
        let eng = engine(BeamFacing::Down, level(1), GeometryConfig::default());
        let offsets = eng.bin_offsets().unwrap();
        assert_eq!(offsets.shape(), (10, 4));
        // Вертикальная составляющая равна расстоянию до центра ячейки
        assert_relative_eq!(offsets[(0, 0)][2], -2.0, epsilon = 1e-9);

        let positions = eng.bin_positions().unwrap();
        assert_eq!(positions.shape(), (1, 10, 4));
        assert_relative_eq!(positions[(0, 3, 1)][2], -5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_wrong_beam_count() {
        let fl = FixedLeader {
            n_beams: 3,
            ..leader(BeamFacing::Down)
        };
        let err = BottomTrackGeometryEngine::new(
            &fl,
            level(1),
            Positions::origin(1),
            &PlatformConfig::default(),
            &GeometryConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, AdcpError::InvalidGeometry(_)));
    }
}
