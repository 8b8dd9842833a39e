use std::path::Path;

use adcp_core::{decode_parallel, Pd0Data, Pd0Reader};
use adcp_processing::{Survey, SurveyExporter, SurveyReport};
use anyhow::{Context, Result};
use log::info;

use crate::{metrics::RunMetrics, ProcessOptions, ReportFormat};

/// Декодирует файл последовательно или в `workers` потоков.
pub fn decode_file(
    path: &Path,
    workers: usize,
) -> Result<Pd0Data> {
    let data = if workers > 1 {
        decode_parallel(path, workers)?
    } else {
        Pd0Reader::open(path)?.read_all()?
    };
    Ok(data)
}

/// Сводка по файлу для команды `info`.
pub struct FileSummary<'a> {
    pub path: &'a Path,
    pub data: &'a Pd0Data,
}

impl std::fmt::Display for FileSummary<'_> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let d = self.data;
        let fl = &d.fixed_leader;
        let sc = &fl.system_configuration;
        let ts = d.timestamps();
        let fmt_opt = |v: Option<String>| v.unwrap_or_else(|| "unknown".to_string());

        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "  File          : {}", self.path.display())?;
        writeln!(
            f,
            "  Firmware      : {}.{}",
            fl.cpu_fw_version, fl.cpu_fw_revision
        )?;
        writeln!(
            f,
            "  Frequency     : {}",
            fmt_opt(sc.frequency.map(|fr| format!("{:.1} kHz", fr.khz())))
        )?;
        writeln!(
            f,
            "  Orientation   : {}",
            if sc.is_down_looking() { "down" } else { "up" }
        )?;
        writeln!(
            f,
            "  Beams / cells : {} x {} ({:.2} m cells, bin 1 at {:.2} m)",
            fl.n_beams,
            fl.n_cells,
            fl.cell_length_m(),
            fl.bin1_distance_m()
        )?;
        writeln!(f, "  Beam angle    : {:.1}°", fl.beam_angle_deg())?;
        writeln!(f, "  Native frame  : {}", d.native_frame())?;
        writeln!(
            f,
            "  Ensembles     : {} ({:?})",
            d.n_ensembles(),
            d.count_status
        )?;
        writeln!(
            f,
            "  Time span     : {} .. {}",
            fmt_opt(ts.iter().flatten().next().map(|t| t.to_string())),
            fmt_opt(ts.iter().flatten().last().map(|t| t.to_string()))
        )?;
        writeln!(
            f,
            "  Bottom track  : {}",
            if d.has_bottom_track() { "yes" } else { "no" }
        )?;
        writeln!(
            f,
            "  Checksum fails: {}, skipped {} B, trailing {} B",
            d.stats.checksum_failures, d.stats.bytes_skipped, d.stats.trailing_bytes
        )?;
        write!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")
    }
}

/// Полная обработка файла: декодирование, маски, производные поля, отчёт.
pub struct ProcessingRun {
    options: ProcessOptions,
    metrics: RunMetrics,
}

impl ProcessingRun {
    pub fn new(options: ProcessOptions) -> Self {
        Self {
            options,
            metrics: RunMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Запускает обработку. Блокируется до записи всех файлов.
    pub fn run(&mut self) -> Result<SurveyReport> {
        let opts = &self.options;
        let config = opts.load_config().context("loading processing config")?;
        let navigation = opts.load_navigation().context("loading navigation")?;

        self.metrics.bytes_read = std::fs::metadata(&opts.input)
            .with_context(|| format!("reading {}", opts.input.display()))?
            .len();

        let data = RunMetrics::time(&mut self.metrics.decode, || {
            decode_file(&opts.input, opts.workers)
        })
        .with_context(|| format!("decoding {}", opts.input.display()))?;
        self.metrics.ensembles = data.n_ensembles();

        let mut survey = Survey::new(data, config)?;
        survey.set_navigation(navigation)?;

        let frame = opts.frame;
        let report = RunMetrics::time(&mut self.metrics.process, || {
            SurveyReport::build(&mut survey, frame)
        })
        .with_context(|| format!("processing in {frame} frame"))?;

        info!(
            "Mask coverage: beam {:.1}%, velocity {:.1}%",
            report.beam_mask_coverage * 100.0,
            report.velocity_mask_coverage * 100.0
        );

        let written = RunMetrics::time(&mut self.metrics.export, || -> Result<usize> {
            match opts.format {
                ReportFormat::Json => SurveyExporter::write_json(&report, &opts.output)?,
                ReportFormat::Csv => SurveyExporter::write_ensembles_csv(&report, &opts.output)?,
            }
            let mut n = 1;

            if let Some(path) = &opts.velocity_csv {
                SurveyExporter::write_velocity_csv(&mut survey, frame, path)?;
                n += 1;
            }
            Ok(n)
        })
        .context("writing output")?;
        self.metrics.files_written = written;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use adcp_core::Pd0Builder;
    use adcp_types::CoordinateFrame;
    use tempfile::tempdir;

    use super::*;

    fn options(
        dir: &Path,
        n: usize,
    ) -> ProcessOptions {
        let input = dir.join("survey.000");
        Pd0Builder::new(10, 4)
            .with_bottom_track([700; 4])
            .write_to(&input, n)
            .unwrap();

        ProcessOptions {
            input,
            config: None,
            navigation: None,
            frame: CoordinateFrame::Earth,
            output: dir.join("report.json"),
            format: ReportFormat::Json,
            velocity_csv: None,
            workers: 1,
        }
    }

    #[test]
    fn test_summary_mentions_layout() {
        let dir = tempdir().unwrap();
        let opts = options(dir.path(), 3);
        let data = decode_file(&opts.input, 2).unwrap();

        let text = FileSummary {
            path: &opts.input,
            data: &data,
        }
        .to_string();
        assert!(text.contains("614.4 kHz"));
        assert!(text.contains("4 x 10"));
        assert!(text.contains("Bottom track  : yes"));
    }

    #[test]
    fn test_process_writes_report() {
        let dir = tempdir().unwrap();
        let opts = ProcessOptions {
            velocity_csv: Some(dir.path().join("velocity.csv")),
            ..options(dir.path(), 5)
        };

        let mut run = ProcessingRun::new(opts.clone());
        let report = run.run().unwrap();

        assert_eq!(report.n_ensembles, 5);
        assert!(opts.output.exists());
        assert!(dir.path().join("velocity.csv").exists());
        assert_eq!(run.metrics().ensembles, 5);
        assert_eq!(run.metrics().files_written, 2);
        assert!(run.metrics().bytes_read > 0);
    }

    #[test]
    fn test_missing_input_has_context() {
        let dir = tempdir().unwrap();
        let opts = ProcessOptions {
            input: dir.path().join("missing.000"),
            ..options(dir.path(), 1)
        };

        let err = ProcessingRun::new(opts).run().unwrap_err();
        assert!(format!("{err:#}").contains("missing.000"));
    }
}
