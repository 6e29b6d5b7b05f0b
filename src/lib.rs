//! pumlgen - PlantUML to SVG pre-commit hook
//!
//! Renders PlantUML sources to SVG from a pre-commit hook, doing as little
//! work as possible on each invocation:
//!
//! - The PlantUML jar is cached inside the hook's virtualenv and verified
//!   against a pinned SHA-256 digest before every use; it is downloaded only
//!   when missing or corrupt.
//! - Diagrams whose `.svg` output already postdates the source are skipped.
//! - The remaining diagrams are rendered in parallel, one `java -jar`
//!   process per diagram, across a pool sized to the host's CPUs.
//!
//! # Modules
//!
//! - `artifact`: digest-verified jar cache
//! - `render`: staleness filter and parallel render pool
//! - `config`: environment resolution (pre-commit virtualenv layout)
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # From a pre-commit hook entry
//! pumlgen docs/flow.puml docs/states.puml
//! ```
//!
//! Exit code 0 means every stale diagram rendered successfully; any render
//! failure or a failed jar integrity check exits non-zero.

pub mod artifact;
pub mod cli;
pub mod config;
pub mod render;

// Re-export main types at crate root for convenience
pub use artifact::{AcquireError, ArtifactCache, ArtifactSpec, Transport, PLANTUML_DIST};
pub use config::Config;
pub use render::{JobInput, JobOutcome, JobStatus, Renderer};
