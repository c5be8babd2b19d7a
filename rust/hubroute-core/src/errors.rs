use thiserror::Error;

use crate::fakes::FakeError;
use crate::graph::GraphError;
use crate::models::NodeIndex;
use crate::profile::ProfileError;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("no route for leg {leg}")]
    NoRoute { leg: usize },
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Fake(#[from] FakeError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("{search} search did not converge after {pops} queue pops")]
    NotConverged { search: &'static str, pops: u64 },
    #[error("hub graph joins {from} to {to} but the detail graph has no path")]
    InconsistentHierarchy { from: NodeIndex, to: NodeIndex },
    #[error("result links are broken or loop at node {node}")]
    BrokenChain { node: NodeIndex },
    #[error("nothing routable near waypoint {index}")]
    NoWaypoint { index: usize },
    #[error("{count} waypoints given, between 2 and 99 supported")]
    TooManyWaypoints { count: usize },
}

impl RouteError {
    /// True for the ordinary "no path exists" outcome, as opposed to a failure.
    pub fn is_no_route(&self) -> bool {
        matches!(self, RouteError::NoRoute { .. })
    }
}
