//! Параллельное декодирование: каждый рабочий поток открывает свой
//! читатель и декодирует непрерывный диапазон ансамблей.
//!
//! Результат совпадает с последовательным чтением: при обрезке или ошибке
//! побеждает событие с наименьшим индексом ансамбля.

use std::{fs::File, path::Path};

use adcp_types::{AdcpError, AdcpResult};
use log::{debug, info, warn};

use crate::{
    dataset::{CountStatus, DecodeStats, Ensemble, Pd0Data},
    reader::{EnsembleLayout, Pd0Reader},
};

/// Причина остановки рабочего потока до конца диапазона.
#[derive(Debug)]
enum Stop {
    Truncated(usize),
    Failed(usize, AdcpError),
}

impl Stop {
    fn index(&self) -> usize {
        match self {
            Stop::Truncated(n) | Stop::Failed(n, _) => *n,
        }
    }
}

/// Результат одного рабочего потока.
#[derive(Debug)]
struct Chunk {
    start: usize,
    ensembles: Vec<Ensemble>,
    stop: Option<Stop>,
}

/// Декодирует файл в `workers` потоков.
pub fn decode_parallel<P: AsRef<Path>>(
    path: P,
    workers: usize,
) -> AdcpResult<Pd0Data> {
    let path = path.as_ref();
    let mut reader = Pd0Reader::open(path)?;

    if workers <= 1 {
        return reader.read_all();
    }

    let first = reader
        .read_ensemble(0)?
        .ok_or_else(|| AdcpError::decode("file holds no complete ensemble"))?;
    let layout = reader.layout();

    let remaining = layout.count.saturating_sub(1);
    if remaining == 0 {
        let mut data = Pd0Data::new(first, layout.first_offset, 1);
        reader.finish_pass();
        data.count_status = reader.count_status();
        data.stats = reader.stats().clone();
        return Ok(data);
    }

    let per_worker = remaining.div_ceil(workers);
    let (tx, rx) = crossbeam_channel::unbounded::<AdcpResult<Chunk>>();

    std::thread::scope(|scope| {
        for start in (1..layout.count).step_by(per_worker) {
            let end = (start + per_worker).min(layout.count);
            let tx = tx.clone();

            scope.spawn(move || {
                let result = decode_range(path, layout, start, end);
                if tx.send(result).is_err() {
                    warn!("Result channel closed before range {start}..{end} was delivered");
                }
            });
        }
    });
    drop(tx);

    let mut chunks = rx.iter().collect::<AdcpResult<Vec<_>>>()?;
    chunks.sort_by_key(|c| c.start);

    // Первое по индексу событие определяет исход
    let cutoff = chunks
        .iter_mut()
        .filter_map(|c| c.stop.take())
        .min_by_key(Stop::index);

    let limit = match cutoff {
        Some(Stop::Failed(n, e)) => {
            warn!("Decoding failed at ensemble {n}");
            return Err(e);
        }
        Some(Stop::Truncated(n)) => n,
        None => layout.count,
    };

    let mut checksum_failures = u64::from(!first.checksum_ok);
    let mut data = Pd0Data::new(first, layout.first_offset, limit);
    for ens in chunks
        .into_iter()
        .flat_map(|c| c.ensembles)
        .take_while(|e| e.index < limit)
    {
        checksum_failures += u64::from(!ens.checksum_ok);
        data.push(ens);
    }

    if limit < layout.count {
        warn!("File truncated at ensemble {limit}; keeping {limit} ensembles");
        data.count_status = CountStatus::Truncated { at: limit };
        data.stats = DecodeStats {
            truncated_at: Some(limit),
            ..reader.stats().clone()
        };
    } else {
        reader.finish_pass();
        data.count_status = reader.count_status();
        data.stats = reader.stats().clone();
    }

    data.stats.ensembles_ok = data.n_ensembles() as u64;
    data.stats.checksum_failures = checksum_failures;
    data.validate_lengths()?;

    info!(
        "Decoded {} ensembles in {workers} workers, status {:?}",
        data.n_ensembles(),
        data.count_status
    );

    Ok(data)
}

fn decode_range(
    path: &Path,
    layout: EnsembleLayout,
    start: usize,
    end: usize,
) -> AdcpResult<Chunk> {
    let mut reader = Pd0Reader::with_layout(File::open(path)?, layout)?;
    let mut chunk = Chunk {
        start,
        ensembles: Vec::with_capacity(end - start),
        stop: None,
    };

    for n in start..end {
        match reader.read_ensemble(n) {
            Ok(Some(ens)) => chunk.ensembles.push(ens),
            Ok(None) => {
                chunk.stop = Some(Stop::Truncated(n));
                break;
            }
            Err(e) => {
                chunk.stop = Some(Stop::Failed(n, e));
                break;
            }
        }
    }

    debug!(
        "Worker {start}..{end}: {} ensembles, {} checksum failures",
        chunk.ensembles.len(),
        reader.stats().checksum_failures
    );

    Ok(chunk)
}
