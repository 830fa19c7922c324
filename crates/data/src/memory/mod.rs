//! In-process implementations of the repository traits.
//!
//! Used by the `memory` queue profile for local runs and by service and
//! router tests. They apply the same pre-flight checks, ordering and tenant
//! scoping as the Postgres repositories.

mod jobs;
mod price;
mod universe;

pub use jobs::{MemoryJobRepository, MemoryJobTransaction};
pub use price::MemoryPriceRepository;
pub use universe::MemoryUniverseRepository;
