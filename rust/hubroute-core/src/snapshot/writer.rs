use std::{fs::File, io::{BufWriter, Write}, path::Path};

use byteorder::{ByteOrder, LittleEndian};

use crate::graph::{GraphError, GraphStore};

use super::manifest::{
    write_node, write_segment, write_way, Manifest, SnapshotCounts, NODE_RECORD, SEGMENT_RECORD, SNAPSHOT_VERSION,
    WAY_RECORD,
};

#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("length mismatch: {0}")]
    LengthMismatch(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct WriteResult {
    pub manifest: Manifest,
    pub hash: [u8; 32],
}

/// Hashes everything it writes.
struct HashingWriter<W: Write> {
    inner: W,
    hasher: blake3::Hasher,
}

impl<W: Write> HashingWriter<W> {
    fn put(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.hasher.update(bytes);
        self.inner.write_all(bytes)
    }
}

/// Serialise any graph store into a single snapshot file.
pub fn write_snapshot<G: GraphStore>(path: impl AsRef<Path>, graph: &G) -> Result<WriteResult, WriterError> {
    let grid = graph.grid();
    let bins = grid.bins() as u64;
    let bin_nodes = graph.bin_offset(grid.bins())?;
    if bin_nodes != graph.node_count() {
        return Err(WriterError::LengthMismatch("bin index does not cover every node"));
    }
    let counts = SnapshotCounts {
        nodes: graph.node_count(),
        segments: graph.segment_count(),
        ways: graph.way_count(),
        bin_nodes,
    };

    // Compute offsets
    let off_nodes = Manifest::SIZE as u64;
    let off_segments = off_nodes + counts.nodes as u64 * NODE_RECORD as u64;
    let off_ways = off_segments + counts.segments as u64 * SEGMENT_RECORD as u64;
    let off_bin_offsets = off_ways + counts.ways as u64 * WAY_RECORD as u64;
    let off_bin_nodes = off_bin_offsets + (bins + 1) * 4;

    let manifest = Manifest {
        version: SNAPSHOT_VERSION,
        counts,
        props_seen: graph.properties_seen(),
        grid,
        off_nodes,
        off_segments,
        off_ways,
        off_bin_offsets,
        off_bin_nodes,
    };

    let file = File::create(path)?;
    let mut out = HashingWriter { inner: BufWriter::new(file), hasher: blake3::Hasher::new() };
    out.put(&manifest.encode())?;

    let mut buf = [0u8; NODE_RECORD];
    for i in 0..counts.nodes {
        write_node(&mut buf, &graph.node(i)?);
        out.put(&buf)?;
    }
    let mut buf = [0u8; SEGMENT_RECORD];
    for i in 0..counts.segments {
        write_segment(&mut buf, &graph.segment(i)?);
        out.put(&buf)?;
    }
    let mut buf = [0u8; WAY_RECORD];
    for i in 0..counts.ways {
        write_way(&mut buf, &graph.way(i)?);
        out.put(&buf)?;
    }
    let mut word = [0u8; 4];
    for bin in 0..=grid.bins() {
        LittleEndian::write_u32(&mut word, graph.bin_offset(bin)?);
        out.put(&word)?;
    }
    for position in 0..counts.bin_nodes {
        LittleEndian::write_u32(&mut word, graph.bin_node(position)?);
        out.put(&word)?;
    }

    let hash = *out.hasher.finalize().as_bytes();
    out.inner.write_all(&hash)?;
    out.inner.flush()?;

    tracing::info!(nodes = counts.nodes, segments = counts.segments, ways = counts.ways, "wrote snapshot");
    Ok(WriteResult { manifest, hash })
}
