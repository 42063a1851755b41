//! Run command - load a script directory and invoke one export.

use anyhow::Result;
use clap::Args;
use scriptdock_runtime::ScriptValue;
use std::path::PathBuf;
use std::rc::Rc;

use crate::commands::{CollectErrors, build_loader};
use crate::config::Config;

#[derive(Args)]
pub struct RunCommand {
    /// Script identifier relative to the script directory, e.g. `tools/search.ts`
    pub script: String,

    /// Dot-separated export path
    #[arg(default_value = "default")]
    pub export: String,

    /// Script directory (defaults to `scripts.dir` from the config)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Arguments as a JSON array
    #[arg(long, default_value = "[]")]
    pub args: String,
}

impl RunCommand {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let args = parse_args(&self.args)?;
        let identifier = normalize_identifier(&self.script);

        let dir = config.scripts_dir(self.dir.as_deref());
        let events = Rc::new(CollectErrors::default());
        let loader = build_loader(config, &dir, events.clone())?;

        loader.start().await?;
        let result = if loader.has(&identifier) {
            loader
                .invoke(&identifier, &self.export, &args)
                .map_err(anyhow::Error::from)
        } else {
            Err(match events.error_for(&identifier) {
                Some(message) => anyhow::anyhow!("Script '{identifier}' failed to load: {message}"),
                None => anyhow::anyhow!("Script not found: {identifier}"),
            })
        };
        loader.stop().await;

        println!("{}", serde_json::to_string_pretty(&result?)?);
        Ok(())
    }
}

fn parse_args(raw: &str) -> Result<Vec<ScriptValue>> {
    match serde_json::from_str(raw) {
        Ok(ScriptValue::Array(values)) => Ok(values),
        Ok(_) => Err(anyhow::anyhow!("--args must be a JSON array")),
        Err(e) => Err(anyhow::anyhow!("Invalid --args JSON: {e}")),
    }
}

fn normalize_identifier(script: &str) -> String {
    let script = script.replace('\\', "/");
    script.trim_start_matches("./").to_string()
}
