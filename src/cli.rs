//! Command-line interface for pumlgen.
//!
//! Pre-commit passes the staged `.puml` files as positional arguments; the
//! process exits 0 only when every stale diagram rendered successfully.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::artifact::{ArtifactCache, PLANTUML_DIST};
use crate::config::Config;
use crate::render::{self, Renderer};

/// pumlgen - render PlantUML diagrams to SVG from pre-commit
#[derive(Parser, Debug)]
#[command(name = "pumlgen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// PlantUML source files to render
    pub files: Vec<PathBuf>,
}

impl Cli {
    /// Execute the hook. `Ok(false)` means at least one diagram failed to
    /// render; errors mean no rendering was attempted at all.
    pub async fn execute(self) -> Result<bool> {
        let config = Config::from_env()?;

        let jar = ArtifactCache::new()
            .acquire(&PLANTUML_DIST, &config.jar_path())
            .await
            .context("failed to acquire the PlantUML jar")?;

        let renderer = Renderer::new(jar);
        Ok(render::run(&renderer, &self.files).await)
    }
}
