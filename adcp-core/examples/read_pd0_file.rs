//! Пример: чтение PD0-файла через Pd0Reader
//!
//! Демонстрирует:
//! - поиск первого ансамбля и оценку их числа до полного прохода
//! - полный проход с подтверждением числа ансамблей
//! - статистику контрольных сумм и обрезки

use adcp_core::Pd0Reader;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let input_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "adcp-core/test_output.000".to_string());

    let mut reader = Pd0Reader::open(&input_path)?;

    println!("✓ First ensemble found");
    println!("  Offset     : {}", reader.first_offset());
    println!("  Stride     : {} bytes", reader.stride());
    println!("  Ensembles  : ~{} (approximate)", reader.ensemble_count());

    let data = reader.read_all()?;
    let fl = &data.fixed_leader;

    println!("\n✓ Read complete");
    println!("  Ensembles  : {} ({:?})", data.n_ensembles(), data.count_status);
    println!("  Cells      : {} x {:.2} m", fl.n_cells, fl.cell_length_m());
    println!("  Beams      : {} @ {}°", fl.n_beams, fl.beam_angle_deg());
    println!("  Frame      : {}", data.native_frame());
    println!("  Frequency  : {:?}", fl.system_configuration.frequency);
    println!("  Bottom trk : {}", data.has_bottom_track());
    println!("  Checksums  : {} failed", data.stats.checksum_failures);

    for (i, ts) in data.timestamps().iter().take(3).enumerate() {
        match ts {
            Some(t) => println!("  Ensemble {i}: {t}"),
            None => println!("  Ensemble {i}: invalid timestamp"),
        }
    }

    Ok(())
}
