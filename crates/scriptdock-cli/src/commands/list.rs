//! List command - load every script once and print what registered.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::rc::Rc;

use crate::commands::{CollectErrors, build_loader};
use crate::config::Config;

#[derive(Args)]
pub struct ListCommand {
    /// Script directory (defaults to `scripts.dir` from the config)
    pub dir: Option<PathBuf>,
}

impl ListCommand {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let dir = config.scripts_dir(self.dir.as_deref());
        let events = Rc::new(CollectErrors::default());
        let loader = build_loader(config, &dir, events.clone())?;

        loader.start().await?;
        let scripts = loader.get_all();
        loader.stop().await;

        let width = scripts.iter().map(|s| s.name.len()).max().unwrap_or(0);
        for script in &scripts {
            println!("{:width$}  {}", script.name, script.identifier);
        }

        let errors = events.errors();
        for (identifier, message) in &errors {
            eprintln!("error: {identifier}: {message}");
        }

        if errors.is_empty() {
            eprintln!("{} script(s) loaded", scripts.len());
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "{} script(s) loaded, {} failed",
                scripts.len(),
                errors.len()
            ))
        }
    }
}
