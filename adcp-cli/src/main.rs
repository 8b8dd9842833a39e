use std::path::PathBuf;

use adcp_cli::{decode_file, FileSummary, ProcessOptions, ProcessingRun, ReportFormat};
use adcp_types::CoordinateFrame;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};

#[derive(Parser, Debug)]
#[command(
    name = "adcp",
    version = env!("CARGO_PKG_VERSION"),
    about = "Decode Teledyne RDI PD0 files and process ADCP currents and backscatter",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Тихий режим (только ошибки)
    #[arg(short, long, global = true)]
    quiet: bool,
    /// Подробный вывод (debug)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Сводка по файлу: конфигурация прибора, число ансамблей, статистика
    Info {
        file: PathBuf,
        /// Потоков декодирования
        #[arg(long, default_value = "1")]
        parallel: usize,
    },
    /// Полная обработка с экспортом отчёта
    Process {
        file: PathBuf,
        /// JSON-конфигурация обработки
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// JSON с навигацией (x, y, z, pitch, roll, heading)
        #[arg(short, long)]
        navigation: Option<PathBuf>,
        /// Система координат: beam, instrument, ship, earth
        #[arg(long, default_value = "earth")]
        frame: CoordinateFrame,
        /// Путь к отчёту
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,
        /// Формат отчёта: json, csv
        #[arg(long, default_value = "json")]
        format: ReportFormat,
        /// Выгрузить маскированные скорости по ячейкам в CSV
        #[arg(long)]
        velocity_csv: Option<PathBuf>,
        /// Потоков декодирования
        #[arg(long, default_value = "1")]
        parallel: usize,
    },
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Info { file, parallel } => {
            let data = decode_file(&file, parallel)
                .with_context(|| format!("decoding {}", file.display()))?;
            info!(
                "\n{}",
                FileSummary {
                    path: &file,
                    data: &data,
                }
            );
        }
        Command::Process {
            file,
            config,
            navigation,
            frame,
            output,
            format,
            velocity_csv,
            parallel,
        } => {
            let options = ProcessOptions {
                input: file,
                config,
                navigation,
                frame,
                output,
                format,
                velocity_csv,
                workers: parallel.max(1),
            };

            let mut pipeline = ProcessingRun::new(options.clone());
            let report = pipeline.run()?;

            info!("\n{}", pipeline.metrics());
            info!(
                "✓ {} ensembles processed in {} frame: {:?}",
                report.n_ensembles, report.frame, options.output
            );
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.quiet {
        LevelFilter::Error
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .format_timestamp_secs()
        .init();

    if let Err(e) = run(cli.command) {
        error!("{e:#}");
        std::process::exit(1);
    }
}
