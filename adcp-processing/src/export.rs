//! Экспорт результатов обработки: JSON-отчёт по файлу и CSV-таблицы.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use adcp_core::{CountStatus, DecodeStats};
use adcp_types::{AdcpResult, CoordinateFrame, VariableLeader};
use chrono::NaiveDateTime;
use log::info;
use serde::Serialize;

use crate::{
    mask::{coverage2, coverage3},
    survey::Survey,
    transform::direction_deg,
};

/// Сводка по одному ансамблю.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleSummary {
    pub index: usize,
    pub ensemble_number: u32,
    pub timestamp: Option<NaiveDateTime>,
    pub heading_deg: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
    /// Модуль среднего вектора по годным ячейкам, м/с
    pub mean_speed: Option<f64>,
    /// Направление среднего вектора, градусы
    pub mean_direction: Option<f64>,
    pub valid_cells: usize,
    pub seabed_depth: Option<f64>,
}

/// Отчёт по файлу.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveyReport {
    pub n_ensembles: usize,
    pub n_cells: usize,
    pub n_beams: usize,
    pub native_frame: CoordinateFrame,
    pub frame: CoordinateFrame,
    pub frequency_khz: Option<f64>,
    pub beam_angle_deg: f64,
    pub cell_length_m: f64,
    pub bin1_distance_m: f64,
    pub has_bottom_track: bool,
    pub count_status: CountStatus,
    pub stats: DecodeStats,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
    /// Доля исключённых лучевых значений
    pub beam_mask_coverage: f64,
    /// Доля исключённых скоростей
    pub velocity_mask_coverage: f64,
    pub ensembles: Vec<EnsembleSummary>,
}

impl SurveyReport {
    /// Строит отчёт; скорости усредняются в системе `frame`.
    pub fn build(
        survey: &mut Survey,
        frame: CoordinateFrame,
    ) -> AdcpResult<Self> {
        let beam_mask_coverage = coverage3(survey.beam_mask()?);
        let velocity_mask_coverage = coverage2(survey.velocity_mask()?);
        let depth = survey.mean_seabed_depth()?;
        let velocity = survey.velocity(frame)?;
        let data = survey.data();
        let fl = &data.fixed_leader;
        let timestamps = data.timestamps();
        let n_cells = velocity.n_cells();

        let ensembles = data
            .variable_leaders
            .iter()
            .enumerate()
            .map(|(e, vl)| {
                let (mut east, mut north, mut valid) = (0.0, 0.0, 0usize);
                // В лучевой системе горизонтальной скорости нет
                if frame != CoordinateFrame::Beam {
                    for c in 0..n_cells {
                        let (u, v) = (velocity.data[(e, c, 0)], velocity.data[(e, c, 1)]);
                        if u.is_finite() && v.is_finite() {
                            east += u;
                            north += v;
                            valid += 1;
                        }
                    }
                }
                // Модуль и направление берутся от среднего вектора
                let (east, north) = (east / valid as f64, north / valid as f64);

                EnsembleSummary {
                    index: e,
                    ensemble_number: vl.ensemble_index(),
                    timestamp: timestamps[e],
                    heading_deg: vl.heading_deg(),
                    pitch_deg: vl.pitch_deg(),
                    roll_deg: vl.roll_deg(),
                    mean_speed: (valid > 0).then(|| east.hypot(north)),
                    mean_direction: (valid > 0).then(|| direction_deg(east, north)),
                    valid_cells: valid,
                    seabed_depth: finite(depth[e]),
                }
            })
            .collect();

        Ok(Self {
            n_ensembles: data.n_ensembles(),
            n_cells: data.n_cells(),
            n_beams: data.n_beams(),
            native_frame: data.native_frame(),
            frame,
            frequency_khz: fl.system_configuration.frequency.map(|f| f.khz()),
            beam_angle_deg: fl.beam_angle_deg(),
            cell_length_m: fl.cell_length_m(),
            bin1_distance_m: fl.bin1_distance_m(),
            has_bottom_track: data.has_bottom_track(),
            count_status: data.count_status,
            stats: data.stats.clone(),
            first_timestamp: timestamps.iter().flatten().next().copied(),
            last_timestamp: timestamps.iter().flatten().last().copied(),
            beam_mask_coverage,
            velocity_mask_coverage,
            ensembles,
        })
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn opt(v: Option<f64>) -> String {
    v.map_or_else(String::new, |v| format!("{v:.4}"))
}

pub struct SurveyExporter;

impl SurveyExporter {
    /// Отчёт в JSON.
    pub fn write_json(
        report: &SurveyReport,
        path: &Path,
    ) -> AdcpResult<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer_pretty(&mut writer, report).map_err(std::io::Error::from)?;
        writer.flush()?;

        info!("Report written to {}", path.display());
        Ok(())
    }

    /// Сводка по ансамблям в CSV.
    pub fn write_ensembles_csv(
        report: &SurveyReport,
        path: &Path,
    ) -> AdcpResult<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        // Заголовок
        writeln!(
            writer,
            "index,ensemble,timestamp,heading_deg,pitch_deg,roll_deg,mean_speed_m_s,mean_direction_deg,valid_cells,seabed_depth_m"
        )?;

        for ens in &report.ensembles {
            writeln!(
                writer,
                "{},{},{},{:.2},{:.2},{:.2},{},{},{},{}",
                ens.index,
                ens.ensemble_number,
                ens.timestamp.map(|t| t.to_string()).unwrap_or_default(),
                ens.heading_deg,
                ens.pitch_deg,
                ens.roll_deg,
                opt(ens.mean_speed),
                opt(ens.mean_direction),
                ens.valid_cells,
                opt(ens.seabed_depth),
            )?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Маскированные скорости по ячейкам в CSV. Пустое поле: исключённое
    /// значение.
    pub fn write_velocity_csv(
        survey: &mut Survey,
        frame: CoordinateFrame,
        path: &Path,
    ) -> AdcpResult<()> {
        let velocity = survey.velocity(frame)?;
        let centers = survey.data().fixed_leader.bin_centers_m();
        let numbers: Vec<u32> = survey
            .data()
            .variable_leaders
            .iter()
            .map(VariableLeader::ensemble_index)
            .collect();
        let (n_ens, n_cells, _) = velocity.data.shape();

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "# frame: {frame}")?;
        writeln!(writer, "ensemble,cell,range_m,v1,v2,v3,v4")?;

        for e in 0..n_ens {
            for c in 0..n_cells {
                let lane = velocity.data.lane(e, c);
                writeln!(
                    writer,
                    "{},{},{:.3},{},{},{},{}",
                    numbers[e],
                    c,
                    centers[c],
                    opt(finite(lane[0])),
                    opt(finite(lane[1])),
                    opt(finite(lane[2])),
                    opt(finite(lane[3])),
                )?;
            }
        }

        writer.flush()?;
        info!("Velocities ({frame}) written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use adcp_core::{Pd0Builder, Pd0Reader};
    use approx::assert_relative_eq;

    use super::*;
    use crate::config::ProcessingConfig;

    fn survey(builder: &Pd0Builder, n: usize) -> Survey {
        let data = Pd0Reader::new(Cursor::new(builder.build(n).unwrap()))
            .unwrap()
            .read_all()
            .unwrap();
        Survey::new(data, ProcessingConfig::default()).unwrap()
    }

    #[test]
    fn test_report_summarises_ensembles() {
        // Везде 0.3 м/с на восток и 0.4 м/с на север
        let builder = Pd0Builder::new(6, 4)
            .with_frame(3)
            .with_velocity(|_, _, b| [300, 400, 0, 0][b])
            .with_bottom_track([800; 4]);
        let mut s = survey(&builder, 4);

        let report = SurveyReport::build(&mut s, CoordinateFrame::Earth).unwrap();
        assert_eq!(report.n_ensembles, 4);
        assert_eq!(report.ensembles.len(), 4);
        assert!(report.has_bottom_track);
        assert_eq!(report.velocity_mask_coverage, 0.0);

        let ens = &report.ensembles[2];
        assert_eq!(ens.valid_cells, 6);
        assert_relative_eq!(ens.mean_speed.unwrap(), 0.5, epsilon = 1e-9);
        assert_relative_eq!(
            ens.mean_direction.unwrap(),
            0.3f64.atan2(0.4).to_degrees(),
            epsilon = 1e-9
        );
        assert!(ens.seabed_depth.unwrap() > 7.0);
    }

    #[test]
    fn test_opposing_cells_cancel() {
        // Ячейки попеременно 1 м/с на восток и на запад
        let builder = Pd0Builder::new(2, 4)
            .with_frame(3)
            .with_velocity(|_, c, b| match (c, b) {
                (0, 0) => 1000,
                (1, 0) => -1000,
                _ => 0,
            });
        let mut s = survey(&builder, 2);

        let report = SurveyReport::build(&mut s, CoordinateFrame::Earth).unwrap();
        let ens = &report.ensembles[0];
        assert_eq!(ens.valid_cells, 2);
        assert!(ens.mean_speed.unwrap() < 1e-9);
    }

    #[test]
    fn test_beam_frame_report_has_no_speed() {
        let mut s = survey(&Pd0Builder::new(4, 4), 2);
        let report = SurveyReport::build(&mut s, CoordinateFrame::Beam).unwrap();

        assert!(report.ensembles.iter().all(|e| e.mean_speed.is_none()));
        assert!(report.ensembles.iter().all(|e| e.seabed_depth.is_none()));
    }

    #[test]
    fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = survey(&Pd0Builder::new(4, 4).with_frame(3), 3);
        let report = SurveyReport::build(&mut s, CoordinateFrame::Earth).unwrap();

        let json = dir.path().join("report.json");
        SurveyExporter::write_json(&report, &json).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(value["n_ensembles"], 3);
        assert_eq!(value["frame"], "earth");
        assert_eq!(value["count_status"]["status"], "exact");

        let csv = dir.path().join("ensembles.csv");
        SurveyExporter::write_ensembles_csv(&report, &csv).unwrap();
        assert_eq!(std::fs::read_to_string(&csv).unwrap().lines().count(), 4);

        let vel = dir.path().join("velocity.csv");
        SurveyExporter::write_velocity_csv(&mut s, CoordinateFrame::Earth, &vel).unwrap();
        let text = std::fs::read_to_string(&vel).unwrap();
        assert_eq!(text.lines().count(), 2 + 3 * 4);
        assert!(text.starts_with("# frame: earth"));
    }
}
