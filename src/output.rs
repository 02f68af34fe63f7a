use anyhow::{Context, Result};
use log::{error, info};
use simulation_common::{Snapshot, SnapshotFormat};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Resolves the configured format name. Unknown names fall back to JSON.
pub fn resolve_format(name: Option<&str>) -> SnapshotFormat {
    let name = name.unwrap_or("json");
    SnapshotFormat::from_name(name).unwrap_or_else(|| {
        error!("Unknown output format: {}. Using JSON instead.", name);
        SnapshotFormat::Json
    })
}

/// `<base>_snapshots.<ext>` for the given format.
pub fn snapshot_path(base_filename: &str, format: SnapshotFormat) -> PathBuf {
    PathBuf::from(format!("{}_snapshots.{}", base_filename, format.extension()))
}

/// Encodes `snapshots` into `writer`.
///
/// The bincode layout is a `u32` count followed by each snapshot, which is
/// what the visualizer streams from.
pub fn write_snapshots<W: Write>(mut writer: W, snapshots: &[Snapshot], format: SnapshotFormat) -> Result<()> {
    match format {
        SnapshotFormat::Json => {
            serde_json::to_writer(&mut writer, snapshots).context("Error serializing snapshots to JSON")?;
        }
        SnapshotFormat::Bincode => {
            let count = u32::try_from(snapshots.len()).context("Too many snapshots for the bincode header")?;
            bincode::serialize_into(&mut writer, &count).context("Error writing snapshot count")?;
            for snapshot in snapshots {
                bincode::serialize_into(&mut writer, snapshot).context("Error serializing snapshot to bincode")?;
            }
        }
        SnapshotFormat::MessagePack => {
            rmp_serde::encode::write(&mut writer, snapshots).context("Error serializing snapshots to MessagePack")?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Writes all snapshots to `path`.
pub fn save_snapshots(path: &Path, snapshots: &[Snapshot], format: SnapshotFormat) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Error creating snapshot file '{}'", path.display()))?;
    write_snapshots(BufWriter::new(file), snapshots, format)?;
    info!("{} snapshots saved to {} ({:?} format)", snapshots.len(), path.display(), format);
    Ok(())
}

/// Writes `x,y,radius` rows for every body.
pub fn write_final_positions<W: Write>(writer: W, rows: &[(f32, f32, f32)]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["x", "y", "radius"])?;
    for (x, y, r) in rows {
        writer.write_record(&[format!("{:.4}", x), format!("{:.4}", y), format!("{:.4}", r)])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_final_positions(path: &Path, rows: &[(f32, f32, f32)]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Error saving CSV file '{}'", path.display()))?;
    write_final_positions(file, rows)?;
    info!("Final positions saved to {}", path.display());
    Ok(())
}
