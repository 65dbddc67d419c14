//! Index provisioning: source resolution, building, and load coordination.

mod build;
mod coordinator;
mod resolver;
mod source;
mod state;

pub use build::{build_from_path, RawBuild};
pub use coordinator::{CoordinatorView, LoadCoordinator};
pub use resolver::{BuiltIndex, SourceResolver, SourcesConfig};
pub use source::{CorpusSource, SourceKind};
pub use state::{LoadOutcome, LoadState, LoadStatus, Published};
