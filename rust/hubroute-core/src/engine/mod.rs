pub mod admissibility;
pub mod assemble;
pub mod cost;
pub mod queue;
pub mod results;
pub mod search;
pub mod view;

pub use admissibility::{Admissibility, Check, Rejection, Verdict};
pub use assemble::{build_route, fix_forward_route};
pub use cost::CostModel;
pub use queue::ResultQueue;
pub use results::{NodeResult, ResultId, ResultStore};
pub use search::Search;
pub use view::EngineView;
