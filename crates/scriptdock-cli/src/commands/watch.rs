//! Watch command - load a script directory and hot-reload it until interrupted.

use anyhow::Result;
use clap::Args;
use scriptdock_loader::TracingEvents;
use std::path::PathBuf;
use std::rc::Rc;

use crate::commands::build_loader;
use crate::config::Config;

#[derive(Args)]
pub struct WatchCommand {
    /// Script directory (defaults to `scripts.dir` from the config)
    pub dir: Option<PathBuf>,
}

impl WatchCommand {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let dir = config.scripts_dir(self.dir.as_deref());
        let loader = build_loader(config, &dir, Rc::new(TracingEvents))?;

        loader.start().await?;
        tracing::info!(
            dir = %dir.display(),
            scripts = loader.count(),
            "watching for changes, press Ctrl+C to stop"
        );

        tokio::signal::ctrl_c().await?;
        loader.stop().await;
        Ok(())
    }
}
