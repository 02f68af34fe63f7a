use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Counters gathered while one frame is processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    /// Bodies that landed in a grid cell this frame.
    pub binned_bodies: u32,
    /// Cells holding at least one body.
    pub non_empty_cells: u32,
    /// Pairs that overlapped and had their velocities exchanged.
    pub collisions: u32,
    /// Pairs skipped because their centres coincided.
    pub degenerate_pairs: u32,
    /// Bodies whose direction was reflected by a wall.
    pub wall_bounces: u32,
}

impl FrameStats {
    pub fn merge(&mut self, other: &FrameStats) {
        self.binned_bodies += other.binned_bodies;
        self.non_empty_cells += other.non_empty_cells;
        self.collisions += other.collisions;
        self.degenerate_pairs += other.degenerate_pairs;
        self.wall_bounces += other.wall_bounces;
    }
}

/// What the rendering sink needs to draw one body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodySample {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

/// A snapshot of the simulation state and metrics at a specific frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Frame number (0 = initial state before any step).
    pub frame: u64,
    /// Simulated time in seconds.
    pub time: f32,
    /// The total number of bodies in the arena.
    pub total_body_count: u32,
    /// Counters of the frame that produced this state.
    pub stats: FrameStats,
    /// Sum of `0.5 * radius * speed^2` over all bodies (radius stands in for mass).
    pub kinetic_energy: f32,
    /// Per-body position and radius. Empty unless `save_positions_in_snapshot` is set.
    #[serde(default)]
    pub bodies: Vec<BodySample>,
}

/// On-disk encodings for recorded snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    /// `u32` snapshot count followed by each snapshot, so readers can stream.
    Bincode,
    MessagePack,
}

impl SnapshotFormat {
    /// Maps a config string to a format. `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(SnapshotFormat::Json),
            "bincode" | "bin" => Some(SnapshotFormat::Bincode),
            "messagepack" | "msgpack" => Some(SnapshotFormat::MessagePack),
            _ => None,
        }
    }

    /// Guesses the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_name)
    }

    pub fn extension(self) -> &'static str {
        match self {
            SnapshotFormat::Json => "json",
            SnapshotFormat::Bincode => "bin",
            SnapshotFormat::MessagePack => "msgpack",
        }
    }
}

/// Reads every snapshot from `reader` in the given format.
pub fn read_snapshots<R: Read>(mut reader: R, format: SnapshotFormat) -> Result<Vec<Snapshot>> {
    match format {
        SnapshotFormat::Json => serde_json::from_reader(reader).context("Failed to parse snapshot JSON"),
        SnapshotFormat::MessagePack => rmp_serde::decode::from_read(reader).context("Failed to parse snapshot MessagePack"),
        SnapshotFormat::Bincode => {
            // Read the snapshot count as u32 to match how it was written
            let count: u32 = bincode::deserialize_from(&mut reader)
                .context("Failed to read snapshot count from header")?;
            let mut snapshots = Vec::with_capacity(count as usize);
            for i in 0..count {
                let snapshot: Snapshot = bincode::deserialize_from(&mut reader)
                    .with_context(|| format!("Failed to read snapshot {} of {}", i, count))?;
                snapshots.push(snapshot);
            }
            Ok(snapshots)
        }
    }
}

/// Opens a snapshot file, picking the format from its extension.
pub fn load_snapshots<P: AsRef<Path>>(path: P) -> Result<Vec<Snapshot>> {
    let path = path.as_ref();
    let format = SnapshotFormat::from_path(path)
        .with_context(|| format!("Cannot tell snapshot format of '{}' from its extension", path.display()))?;
    let file = File::open(path).with_context(|| format!("Failed to open snapshot file '{}'", path.display()))?;
    let snapshots = read_snapshots(BufReader::new(file), format)?;
    log::debug!("Loaded {} snapshots from {}", snapshots.len(), path.display());
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(frame: u64) -> Snapshot {
        Snapshot {
            frame,
            time: frame as f32 / 60.0,
            total_body_count: 2,
            stats: FrameStats { binned_bodies: 2, non_empty_cells: 1, collisions: 1, ..Default::default() },
            kinetic_energy: 12.5,
            bodies: vec![
                BodySample { x: 1.0, y: 2.0, radius: 5.0 },
                BodySample { x: 3.0, y: 4.0, radius: 6.0 },
            ],
        }
    }

    #[test]
    fn format_names_and_extensions() {
        assert_eq!(SnapshotFormat::from_name("JSON"), Some(SnapshotFormat::Json));
        assert_eq!(SnapshotFormat::from_name("msgpack"), Some(SnapshotFormat::MessagePack));
        assert_eq!(SnapshotFormat::from_name("yaml"), None);
        assert_eq!(SnapshotFormat::from_path(Path::new("run_snapshots.bin")), Some(SnapshotFormat::Bincode));
    }

    #[test]
    fn bincode_stream_with_count_header() {
        let snapshots = vec![sample(0), sample(1)];
        let mut bytes = Vec::new();
        bincode::serialize_into(&mut bytes, &(snapshots.len() as u32)).unwrap();
        for s in &snapshots {
            bincode::serialize_into(&mut bytes, s).unwrap();
        }

        let decoded = read_snapshots(bytes.as_slice(), SnapshotFormat::Bincode).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1].frame, 1);
        assert_eq!(decoded[1].bodies, snapshots[1].bodies);
        assert_eq!(decoded[0].stats, snapshots[0].stats);
    }

    #[test]
    fn json_without_bodies_defaults_to_empty() {
        let json = r#"[{"frame":3,"time":0.05,"total_body_count":0,
            "stats":{"binned_bodies":0,"non_empty_cells":0,"collisions":0,"degenerate_pairs":0,"wall_bounces":0},
            "kinetic_energy":0.0}]"#;
        let decoded = read_snapshots(json.as_bytes(), SnapshotFormat::Json).unwrap();
        assert_eq!(decoded[0].frame, 3);
        assert!(decoded[0].bodies.is_empty());
    }
}
