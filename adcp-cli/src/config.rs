use std::path::{Path, PathBuf};

use adcp_processing::{Navigation, ProcessingConfig};
use adcp_types::{AdcpError, AdcpResult, CoordinateFrame};

/// Формат отчёта `process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    /// Сводка по ансамблям
    Csv,
}

/// Параметры команды `process`.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Файл PD0
    pub input: PathBuf,
    /// JSON-конфигурация обработки; `None`: значения по умолчанию
    pub config: Option<PathBuf>,
    /// JSON с рядами навигации
    pub navigation: Option<PathBuf>,
    /// Система координат скоростей в отчёте
    pub frame: CoordinateFrame,
    pub output: PathBuf,
    pub format: ReportFormat,
    /// Дополнительно выгрузить скорости по ячейкам
    pub velocity_csv: Option<PathBuf>,
    /// Потоков декодирования (1 = последовательно)
    pub workers: usize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ProcessOptions {
    pub fn load_config(&self) -> AdcpResult<ProcessingConfig> {
        match &self.config {
            Some(path) => ProcessingConfig::from_path(path),
            None => Ok(ProcessingConfig::default()),
        }
    }

    pub fn load_navigation(&self) -> AdcpResult<Option<Navigation>> {
        self.navigation
            .as_deref()
            .map(load_navigation)
            .transpose()
    }
}

/// Читает навигацию из JSON-файла.
pub fn load_navigation(path: &Path) -> AdcpResult<Navigation> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        AdcpError::configuration(format!("invalid navigation file {}: {e}", path.display()))
    })
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для ReportFormat
////////////////////////////////////////////////////////////////////////////////

impl std::fmt::Display for ReportFormat {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ReportFormat::Json => write!(f, "json"),
            ReportFormat::Csv => write!(f, "csv"),
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            _ => Err(format!("Unknown report format '{s}'. Use: json, csv")),
        }
    }
}

#[cfg(test)]
mod tests {
    use adcp_types::Series;
    use tempfile::NamedTempFile;

    use super::*;

    fn options() -> ProcessOptions {
        ProcessOptions {
            input: PathBuf::from("survey.000"),
            config: None,
            navigation: None,
            frame: CoordinateFrame::Earth,
            output: PathBuf::from("report.json"),
            format: ReportFormat::Json,
            velocity_csv: None,
            workers: 1,
        }
    }

    #[test]
    fn test_report_format_parse() {
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("csv".parse::<ReportFormat>().unwrap(), ReportFormat::Csv);
        assert!("xml".parse::<ReportFormat>().is_err());
        assert_eq!(ReportFormat::Csv.to_string(), "csv");
    }

    #[test]
    fn test_default_config_without_file() {
        assert_eq!(options().load_config().unwrap(), ProcessingConfig::default());
        assert!(options().load_navigation().unwrap().is_none());
    }

    #[test]
    fn test_load_navigation_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{ "x": [0.0, 1.0], "heading": 90.0 }"#).unwrap();

        let opts = ProcessOptions {
            navigation: Some(file.path().to_path_buf()),
            ..options()
        };
        let nav = opts.load_navigation().unwrap().unwrap();
        assert_eq!(nav.x, Series::Variable(vec![0.0, 1.0]));
        assert_eq!(nav.heading, Some(Series::Constant(90.0)));
    }

    #[test]
    fn test_bad_navigation_is_configuration_error() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{ "speed": 1 }"#).unwrap();

        assert!(matches!(
            load_navigation(file.path()),
            Err(AdcpError::Configuration(_))
        ));
    }
}
