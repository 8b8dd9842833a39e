use std::io::Cursor;

use adcp_core::{Pd0Builder, Pd0Data, Pd0Reader};
use adcp_processing::{
    BottomExclusion, Bounds, Navigation, ProcessingConfig, SscCalibration, Survey, SurveyReport,
};
use adcp_types::{AdcpError, CoordinateFrame, Series};
use approx::assert_relative_eq;
use tempfile::NamedTempFile;

// ===========================================================================
// Helpers
// ===========================================================================

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn survey_from(
    builder: &Pd0Builder,
    n: usize,
    config: ProcessingConfig,
) -> Survey {
    init_logger();
    let data = Pd0Reader::new(Cursor::new(builder.build(n).unwrap()))
        .unwrap()
        .read_all()
        .unwrap();
    Survey::new(data, config).unwrap()
}

const CONFIG_JSON: &str = r#"{
    "acoustics": { "ssc": { "a": 4.0, "b": 0.05 } },
    "water": { "temperature": 12.0, "salinity": 30.0 },
    "orientation": { "magnetic_declination": 10.0 },
    "masking": {
        "beam": { "correlation": { "min": 64 } },
        "velocity": {
            "err_vel_max": "auto",
            "bottom": { "enabled": true, "offset_bins": 1.0 }
        }
    },
    "geometry": { "clamp_hab": true }
}"#;

// ===========================================================================
// Скорости
// ===========================================================================

#[test]
fn test_earth_file_round_trip() {
    let builder = Pd0Builder::new(20, 4).with_frame(3);
    let mut survey = survey_from(&builder, 10, ProcessingConfig::default());

    assert_eq!(survey.n_ensembles(), 10);
    let raw = survey.data().velocity_m_s();
    let earth = survey.velocity(CoordinateFrame::Earth).unwrap();
    assert_eq!(earth.frame, CoordinateFrame::Earth);
    assert_eq!(earth.data, raw);

    for frame in [CoordinateFrame::Beam, CoordinateFrame::Instrument, CoordinateFrame::Ship] {
        assert!(matches!(
            survey.velocity(frame),
            Err(AdcpError::UnsupportedTransform {
                from: CoordinateFrame::Earth,
                ..
            })
        ));
    }
}

#[test]
fn test_beam_file_vertical_velocity() {
    // Одинаковая радиальная скорость на всех лучах: чисто вертикальный поток
    let builder = Pd0Builder::new(5, 4).with_velocity(|_, _, _| 100);
    let mut survey = survey_from(&builder, 3, ProcessingConfig::default());

    let earth = survey.velocity(CoordinateFrame::Earth).unwrap();
    let w = 0.1 / 20f64.to_radians().cos();
    for c in 0..5 {
        assert_relative_eq!(earth.data[(1, c, 0)], 0.0, epsilon = 1e-9);
        assert_relative_eq!(earth.data[(1, c, 1)], 0.0, epsilon = 1e-9);
        assert_relative_eq!(earth.data[(1, c, 2)], w, epsilon = 1e-9);
        assert_relative_eq!(earth.data[(1, c, 3)], 0.0, epsilon = 1e-9);
    }

    let speed = survey.speed(CoordinateFrame::Earth).unwrap();
    assert!(speed.iter().all(|&s| s.abs() < 1e-9));
    assert!(matches!(
        survey.speed(CoordinateFrame::Beam),
        Err(AdcpError::Configuration(_))
    ));
}

#[test]
fn test_heading_bias_invalidates_cache() {
    let builder = Pd0Builder::new(4, 4)
        .with_frame(1)
        .with_velocity(|_, _, b| if b == 1 { 1000 } else { 0 });
    let mut survey = survey_from(&builder, 2, ProcessingConfig::default());

    let before = survey.direction(CoordinateFrame::Earth).unwrap();
    assert_relative_eq!(before[(0, 0)], 0.0, epsilon = 1e-9);

    let mut config = ProcessingConfig::default();
    config.orientation.heading_bias = 45.0;
    survey.set_config(config).unwrap();

    let after = survey.direction(CoordinateFrame::Earth).unwrap();
    assert_relative_eq!(after[(0, 0)], 45.0, epsilon = 1e-9);
}

#[test]
fn test_navigation_overrides_heading() {
    let builder = Pd0Builder::new(4, 4)
        .with_frame(1)
        .with_attitude(|_| (4500, 0, 0))
        .with_velocity(|_, _, b| if b == 1 { 1000 } else { 0 });
    let mut survey = survey_from(&builder, 3, ProcessingConfig::default());

    assert_relative_eq!(
        survey.direction(CoordinateFrame::Earth).unwrap()[(2, 1)],
        45.0,
        epsilon = 1e-9
    );

    survey
        .set_navigation(Some(Navigation {
            heading: Some(Series::Variable(vec![180.0, 180.0, 270.0])),
            ..Navigation::default()
        }))
        .unwrap();
    let dir = survey.direction(CoordinateFrame::Earth).unwrap();
    assert_relative_eq!(dir[(0, 1)], 180.0, epsilon = 1e-9);
    assert_relative_eq!(dir[(2, 1)], 270.0, epsilon = 1e-9);
}

// ===========================================================================
// Геометрия и маски
// ===========================================================================

#[test]
fn test_without_bottom_track() {
    let mut config = ProcessingConfig::default();
    config.masking.beam.bottom = BottomExclusion {
        enabled: true,
        offset_bins: 0.0,
    };
    let mut survey = survey_from(&Pd0Builder::new(20, 4), 4, config);

    assert!(survey.bottom_track_velocity(CoordinateFrame::Beam).unwrap().is_none());
    assert!(survey.height_above_bed().unwrap().iter().all(|v| v.is_nan()));
    assert!(survey.mean_seabed_depth().unwrap().iter().all(|v| v.is_nan()));
    assert!(survey
        .seabed_points()
        .unwrap()
        .iter()
        .all(|p| p.iter().all(|v| v.is_nan())));
    // Условие у дна пропускается
    assert!(survey.beam_mask().unwrap().iter().all(|&m| !m));
}

#[test]
fn test_bottom_exclusion_with_sidelobe() {
    // Дно на наклонной дальности 8 м: вертикаль 8·cos20° ≈ 7.52 м
    let mut config = ProcessingConfig::default();
    config.masking.velocity.bottom = BottomExclusion {
        enabled: true,
        offset_bins: 0.0,
    };
    let builder = Pd0Builder::new(20, 4).with_bottom_track([800; 4]);
    let mut survey = survey_from(&builder, 3, config);

    let limit = 8.0 * 20f64.to_radians().cos();
    let centers = survey.data().fixed_leader.bin_centers_m();
    let mask = survey.velocity_mask().unwrap().clone();
    for (c, center) in centers.iter().enumerate() {
        assert_eq!(mask[(1, c)], *center > limit, "cell {c} at {center} m");
    }

    // Высота над дном убывает с номером ячейки
    let hab = survey.height_above_bed().unwrap();
    assert!(hab[(0, 0, 0)] > hab[(0, 5, 0)]);
}

#[test]
fn test_up_looking_ignores_bottom_exclusion() {
    let mut config = ProcessingConfig::default();
    config.masking.beam.bottom = BottomExclusion {
        enabled: true,
        offset_bins: 0.0,
    };
    config.masking.velocity.bottom = config.masking.beam.bottom;
    let mut builder = Pd0Builder::new(20, 4).with_bottom_track([800; 4]);
    builder.system_configuration[0] |= 0b1000_0000;
    let mut survey = survey_from(&builder, 3, config);

    assert!(survey.velocity_mask().unwrap().iter().all(|&m| !m));
    assert!(survey.beam_mask().unwrap().iter().all(|&m| !m));
    assert!(survey.height_above_bed().unwrap().iter().all(|v| v.is_nan()));
}

#[test]
fn test_missing_bottom_track_section_gives_nan_velocity() {
    init_logger();
    let read_first = |builder: Pd0Builder| {
        Pd0Reader::new(Cursor::new(builder.build(1).unwrap()))
            .unwrap()
            .read_ensemble(0)
            .unwrap()
            .unwrap()
    };
    let mut data = Pd0Data::new(
        read_first(Pd0Builder::new(10, 4).with_bottom_track([1500; 4])),
        0,
        2,
    );
    data.push(read_first(Pd0Builder::new(10, 4)));

    let mut survey = Survey::new(data, ProcessingConfig::default()).unwrap();
    let bt = survey
        .bottom_track_velocity(CoordinateFrame::Instrument)
        .unwrap()
        .unwrap();
    assert!((0..4).all(|i| bt[(0, i)].is_finite()));
    assert!((0..4).all(|i| bt[(1, i)].is_nan()));
}

#[test]
fn test_correlation_mask_hides_backscatter() {
    let builder = Pd0Builder::new(10, 4).with_correlation(|_, c, _| if c < 5 { 120 } else { 30 });
    let mut config = ProcessingConfig::default();
    config.masking.beam.correlation = Bounds::new(Some(64.0), None);
    let mut survey = survey_from(&builder, 3, config);

    let sv = survey.absolute_backscatter().unwrap();
    assert_eq!(sv.shape(), (3, 10, 4));
    assert!(sv[(0, 4, 2)].is_finite());
    assert!(sv[(0, 5, 2)].is_nan());

    let stn = survey.signal_to_noise().unwrap();
    assert!(stn[(0, 9, 0)].is_nan());
    assert!(stn[(0, 0, 0)] > 0.0);
}

// ===========================================================================
// Акустика
// ===========================================================================

#[test]
fn test_suspended_sediment_requires_calibration() {
    let builder = Pd0Builder::new(10, 4);
    let mut survey = survey_from(&builder, 2, ProcessingConfig::default());
    assert!(matches!(
        survey.suspended_sediment(),
        Err(AdcpError::Configuration(_))
    ));

    let mut config = ProcessingConfig::default();
    config.acoustics.ssc = Some(SscCalibration { a: 0.0, b: 0.1 });
    survey.set_config(config).unwrap();

    let sv = survey.absolute_backscatter().unwrap();
    let ssc = survey.suspended_sediment().unwrap();
    assert_relative_eq!(ssc[(1, 2, 3)], 10f64.powf(0.1 * sv[(1, 2, 3)]), max_relative = 1e-12);
}

#[test]
fn test_backscatter_grows_with_echo_at_fixed_range() {
    let builder = Pd0Builder::new(6, 4).with_echo(|e, _, _| 100 + 20 * e as u8);
    let mut config = ProcessingConfig::default();
    config.acoustics.noise_floor = Some(40.0);
    let mut survey = survey_from(&builder, 3, config);

    let sv = survey.absolute_backscatter().unwrap();
    assert!(sv[(0, 3, 1)] < sv[(1, 3, 1)]);
    assert!(sv[(1, 3, 1)] < sv[(2, 3, 1)]);
}

// ===========================================================================
// Полный цикл с файлом и конфигурацией
// ===========================================================================

#[test]
fn test_full_pipeline_from_files() {
    let builder = Pd0Builder::new(15, 4)
        .with_bottom_track([900; 4])
        .with_attitude(|e| (1000 * e as u16, 150, -200));
    let pd0 = NamedTempFile::new().unwrap();
    builder.write_to(pd0.path(), 12).unwrap();

    let cfg_file = NamedTempFile::new().unwrap();
    std::fs::write(cfg_file.path(), CONFIG_JSON).unwrap();
    let config = ProcessingConfig::from_path(cfg_file.path()).unwrap();

    let mut serial = Survey::open(pd0.path(), config.clone(), 1).unwrap();
    let mut parallel = Survey::open(pd0.path(), config, 3).unwrap();

    assert_eq!(serial.n_ensembles(), 12);
    assert_eq!(parallel.data().velocity, serial.data().velocity);

    let earth = serial.velocity(CoordinateFrame::Earth).unwrap();
    assert_eq!(earth.data.shape(), (12, 15, 4));
    assert_eq!(
        serial.velocity_mask().unwrap(),
        parallel.velocity_mask().unwrap()
    );

    let ssc = serial.suspended_sediment().unwrap();
    assert_eq!(ssc.shape(), (12, 15, 4));

    let hab = serial.height_above_bed().unwrap();
    assert!(hab.iter().all(|v| v.is_nan() || *v >= 0.0));

    let bt = serial
        .bottom_track_velocity(CoordinateFrame::Earth)
        .unwrap()
        .unwrap();
    assert_eq!(bt.shape(), (12, 4));

    let report = SurveyReport::build(&mut serial, CoordinateFrame::Earth).unwrap();
    assert_eq!(report.ensembles.len(), 12);
    assert!(report.has_bottom_track);
    assert!(report.velocity_mask_coverage > 0.0);
}

#[test]
fn test_invalid_config_rejected() {
    let json = r#"{ "masking": { "beam": { "correlation": { "min": 90, "max": 10 } } } }"#;
    let err = ProcessingConfig::from_json_str(json).unwrap_err();
    assert!(matches!(err, AdcpError::Configuration(_)));

    let err = ProcessingConfig::from_json_str(r#"{ "unknown": 1 }"#).unwrap_err();
    assert!(matches!(err, AdcpError::Configuration(_)));
}
