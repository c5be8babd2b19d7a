use byteorder::{ByteOrder, LittleEndian};

use crate::graph::BinGrid;
use crate::models::{Node, Segment, Way};

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"HRSS"; // HubRoute SnapShot
pub const SNAPSHOT_VERSION: u32 = 1;
pub const HASH_LEN: usize = 32;

pub const NODE_RECORD: usize = 16;
pub const SEGMENT_RECORD: usize = 20;
pub const WAY_RECORD: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotCounts {
    pub nodes: u32,
    pub segments: u32,
    pub ways: u32,
    pub bin_nodes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Manifest {
    pub version: u32,
    pub counts: SnapshotCounts,
    pub props_seen: u8,
    pub grid: BinGrid,
    pub off_nodes: u64,
    pub off_segments: u64,
    pub off_ways: u64,
    pub off_bin_offsets: u64,
    pub off_bin_nodes: u64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("header too small")]
    HeaderTooSmall,
    #[error("bad magic")]
    BadMagic,
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u32),
    #[error("section out of bounds: {0}")]
    OutOfBounds(&'static str),
    #[error("hash mismatch")]
    HashMismatch,
}

impl Manifest {
    pub const SIZE: usize = 4 /*magic*/ + 4 /*version*/ + 5*4 /*counts+props*/ + 4*4 /*grid*/ + 5*8 /*offsets*/;

    pub fn parse(header: &[u8]) -> Result<Self, ManifestError> {
        if header.len() < Self::SIZE { return Err(ManifestError::HeaderTooSmall); }
        if header[0..4] != SNAPSHOT_MAGIC { return Err(ManifestError::BadMagic); }
        let version = LittleEndian::read_u32(&header[4..8]);
        if version != SNAPSHOT_VERSION { return Err(ManifestError::UnsupportedVersion(version)); }
        let c0 = 8;
        let nodes = LittleEndian::read_u32(&header[c0..c0+4]);
        let segments = LittleEndian::read_u32(&header[c0+4..c0+8]);
        let ways = LittleEndian::read_u32(&header[c0+8..c0+12]);
        let bin_nodes = LittleEndian::read_u32(&header[c0+12..c0+16]);
        let props_seen = LittleEndian::read_u32(&header[c0+16..c0+20]) as u8;
        let g0 = c0 + 20;
        let grid = BinGrid {
            lat_zero: LittleEndian::read_i32(&header[g0..g0+4]),
            lon_zero: LittleEndian::read_i32(&header[g0+4..g0+8]),
            lat_bins: LittleEndian::read_u32(&header[g0+8..g0+12]),
            lon_bins: LittleEndian::read_u32(&header[g0+12..g0+16]),
        };
        let o0 = g0 + 16;
        Ok(Manifest {
            version,
            counts: SnapshotCounts { nodes, segments, ways, bin_nodes },
            props_seen,
            grid,
            off_nodes: LittleEndian::read_u64(&header[o0..o0+8]),
            off_segments: LittleEndian::read_u64(&header[o0+8..o0+16]),
            off_ways: LittleEndian::read_u64(&header[o0+16..o0+24]),
            off_bin_offsets: LittleEndian::read_u64(&header[o0+24..o0+32]),
            off_bin_nodes: LittleEndian::read_u64(&header[o0+32..o0+40]),
        })
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut h = [0u8; Self::SIZE];
        h[0..4].copy_from_slice(&SNAPSHOT_MAGIC);
        LittleEndian::write_u32(&mut h[4..8], self.version);
        let c0 = 8;
        LittleEndian::write_u32(&mut h[c0..c0+4], self.counts.nodes);
        LittleEndian::write_u32(&mut h[c0+4..c0+8], self.counts.segments);
        LittleEndian::write_u32(&mut h[c0+8..c0+12], self.counts.ways);
        LittleEndian::write_u32(&mut h[c0+12..c0+16], self.counts.bin_nodes);
        LittleEndian::write_u32(&mut h[c0+16..c0+20], self.props_seen as u32);
        let g0 = c0 + 20;
        LittleEndian::write_i32(&mut h[g0..g0+4], self.grid.lat_zero);
        LittleEndian::write_i32(&mut h[g0+4..g0+8], self.grid.lon_zero);
        LittleEndian::write_u32(&mut h[g0+8..g0+12], self.grid.lat_bins);
        LittleEndian::write_u32(&mut h[g0+12..g0+16], self.grid.lon_bins);
        let o0 = g0 + 16;
        LittleEndian::write_u64(&mut h[o0..o0+8], self.off_nodes);
        LittleEndian::write_u64(&mut h[o0+8..o0+16], self.off_segments);
        LittleEndian::write_u64(&mut h[o0+16..o0+24], self.off_ways);
        LittleEndian::write_u64(&mut h[o0+24..o0+32], self.off_bin_offsets);
        LittleEndian::write_u64(&mut h[o0+32..o0+40], self.off_bin_nodes);
        h
    }

    /// Number of entries in the bin offset table.
    pub fn bin_offset_entries(&self) -> usize {
        self.grid.bins() as usize + 1
    }

    /// Check every section fits before the trailing hash of a `file_len` byte file.
    pub fn validate_layout(&self, file_len: usize) -> Result<(), ManifestError> {
        fn fits(off: u64, bytes: usize, end: usize) -> bool {
            let off = off as usize;
            off <= end && end - off >= bytes
        }
        if file_len < Self::SIZE + HASH_LEN { return Err(ManifestError::HeaderTooSmall); }
        let end = file_len - HASH_LEN;
        let c = self.counts;
        if !fits(self.off_nodes, c.nodes as usize * NODE_RECORD, end) { return Err(ManifestError::OutOfBounds("nodes")); }
        if !fits(self.off_segments, c.segments as usize * SEGMENT_RECORD, end) { return Err(ManifestError::OutOfBounds("segments")); }
        if !fits(self.off_ways, c.ways as usize * WAY_RECORD, end) { return Err(ManifestError::OutOfBounds("ways")); }
        if !fits(self.off_bin_offsets, self.bin_offset_entries() * 4, end) { return Err(ManifestError::OutOfBounds("bin_offsets")); }
        if !fits(self.off_bin_nodes, c.bin_nodes as usize * 4, end) { return Err(ManifestError::OutOfBounds("bin_nodes")); }
        Ok(())
    }
}

pub fn read_node(b: &[u8]) -> Node {
    Node {
        first_segment: LittleEndian::read_u32(&b[0..4]),
        latitude: LittleEndian::read_i32(&b[4..8]),
        longitude: LittleEndian::read_i32(&b[8..12]),
        allow: LittleEndian::read_u16(&b[12..14]),
        flags: LittleEndian::read_u16(&b[14..16]),
    }
}

pub fn write_node(b: &mut [u8], n: &Node) {
    LittleEndian::write_u32(&mut b[0..4], n.first_segment);
    LittleEndian::write_i32(&mut b[4..8], n.latitude);
    LittleEndian::write_i32(&mut b[8..12], n.longitude);
    LittleEndian::write_u16(&mut b[12..14], n.allow);
    LittleEndian::write_u16(&mut b[14..16], n.flags);
}

pub fn read_segment(b: &[u8]) -> Segment {
    Segment {
        node1: LittleEndian::read_u32(&b[0..4]),
        node2: LittleEndian::read_u32(&b[4..8]),
        next2: LittleEndian::read_u32(&b[8..12]),
        way: LittleEndian::read_u32(&b[12..16]),
        distance: LittleEndian::read_u32(&b[16..20]),
    }
}

pub fn write_segment(b: &mut [u8], s: &Segment) {
    LittleEndian::write_u32(&mut b[0..4], s.node1);
    LittleEndian::write_u32(&mut b[4..8], s.node2);
    LittleEndian::write_u32(&mut b[8..12], s.next2);
    LittleEndian::write_u32(&mut b[12..16], s.way);
    LittleEndian::write_u32(&mut b[16..20], s.distance);
}

// name u32, allow u16, then one byte each for highway, props, speed, weight, height, width, length, pad
pub fn read_way(b: &[u8]) -> Way {
    Way {
        name: LittleEndian::read_u32(&b[0..4]),
        allow: LittleEndian::read_u16(&b[4..6]),
        highway: b[6],
        props: b[7],
        speed: b[8],
        weight: b[9],
        height: b[10],
        width: b[11],
        length: b[12],
    }
}

pub fn write_way(b: &mut [u8], w: &Way) {
    LittleEndian::write_u32(&mut b[0..4], w.name);
    LittleEndian::write_u16(&mut b[4..6], w.allow);
    b[6] = w.highway;
    b[7] = w.props;
    b[8] = w.speed;
    b[9] = w.weight;
    b[10] = w.height;
    b[11] = w.width;
    b[12] = w.length;
    b[13..16].fill(0);
}
