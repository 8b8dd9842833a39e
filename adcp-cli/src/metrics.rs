use std::time::{Duration, Instant};

/// Время этапов и объём работы одного запуска.
#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    pub decode: Duration,
    pub process: Duration,
    pub export: Duration,
    pub bytes_read: u64,
    pub ensembles: usize,
    pub files_written: usize,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Выполняет `f` и добавляет время к этапу `slot`.
    pub fn time<T, F: FnOnce() -> T>(
        slot: &mut Duration,
        f: F,
    ) -> T {
        let start = Instant::now();
        let out = f();
        *slot += start.elapsed();
        out
    }

    pub fn total(&self) -> Duration {
        self.decode + self.process + self.export
    }

    /// Ансамблей в секунду на этапе декодирования.
    pub fn decode_rate(&self) -> f64 {
        let secs = self.decode.as_secs_f64();

        if secs < 1e-9 {
            return 0.0;
        }

        self.ensembles as f64 / secs
    }

    /// Скорость чтения в МБ/с.
    pub fn read_speed_mbps(&self) -> f64 {
        let secs = self.decode.as_secs_f64();

        if secs < 1e-9 {
            return 0.0;
        }

        self.bytes_read as f64 / secs / 1_000_000.0
    }
}

impl std::fmt::Display for RunMetrics {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "  Ensembles     : {}", self.ensembles)?;
        writeln!(
            f,
            "  Decode        : {:.3}s ({:.0} ens/s, {:.1} MB/s)",
            self.decode.as_secs_f64(),
            self.decode_rate(),
            self.read_speed_mbps()
        )?;
        writeln!(f, "  Processing    : {:.3}s", self.process.as_secs_f64())?;
        writeln!(f, "  Export        : {:.3}s", self.export.as_secs_f64())?;
        writeln!(f, "  Files written : {}", self.files_written)?;
        write!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")
    }
}
