mod manifest;
mod reader;
#[cfg(feature = "builder")]
mod writer;

pub use manifest::{Manifest, ManifestError, SnapshotCounts};
pub(crate) use manifest::{read_node, read_segment, read_way, HASH_LEN, NODE_RECORD, SEGMENT_RECORD, WAY_RECORD};
pub use reader::{MappedGraph, SnapshotError};
#[cfg(feature = "builder")]
pub use writer::{write_snapshot, WriteResult, WriterError};
