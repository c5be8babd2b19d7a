pub mod config;
pub mod engine;
pub mod errors;
pub mod fakes;
pub mod geo;
pub mod graph;
pub mod models;
pub mod profile;
pub mod route;
pub mod router;
pub mod snapshot;

pub use config::RouterConfig;
pub use errors::RouteError;
pub use fakes::{FakeError, FakeOverlay};
pub use graph::{GraphBuilder, GraphError, GraphStore, MemoryGraph, SlimCacheConfig, SlimGraph};
pub use profile::{Optimise, PreparedProfile, Profile, ProfileError};
pub use route::{Journey, Route, RouteHop};
pub use router::Router;
pub use snapshot::{MappedGraph, SnapshotError};
