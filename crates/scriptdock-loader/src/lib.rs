//! scriptdock-loader - script registry and hot-reloading loader.
//!
//! The [`ScriptLoader`] lists scripts from a [`ScriptSource`], runs them through
//! the compiler and an [`ExecutionRuntime`](scriptdock_runtime::ExecutionRuntime),
//! and keeps a [`ScriptRegistry`] in sync as files change.
//!
//! # Example
//!
//! ```no_run
//! use std::rc::Rc;
//! use scriptdock_loader::{FsScriptSource, FsSourceConfig, LoaderConfig, ScriptLoader, TracingEvents};
//! use scriptdock_runtime::{BoaRuntime, Compiler, FsModuleResolver, RuntimeOptions};
//!
//! # async fn run() -> scriptdock_loader::LoaderResult<()> {
//! let compiler = Rc::new(Compiler::default());
//! let options = RuntimeOptions::new().with_resolver(Rc::new(FsModuleResolver::new("scripts")));
//! let runtime = BoaRuntime::new(Rc::clone(&compiler), options)?;
//!
//! let loader = ScriptLoader::new(
//!     LoaderConfig::default(),
//!     Rc::new(FsScriptSource::new(FsSourceConfig::new("scripts"))),
//!     compiler,
//!     Box::new(runtime),
//!     Rc::new(TracingEvents),
//! );
//!
//! tokio::task::LocalSet::new()
//!     .run_until(async {
//!         loader.start().await?;
//!         let result = loader.invoke("hello.ts", "default", &[])?;
//!         println!("{result}");
//!         loader.stop().await;
//!         Ok::<_, scriptdock_loader::LoaderError>(())
//!     })
//!     .await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod fs_source;
pub mod loader;
pub mod memory;
pub mod registry;
pub mod source;

pub use config::{DEFAULT_DEBOUNCE, FsSourceConfig, LoaderConfig};
pub use error::{LoaderError, LoaderResult};
pub use events::{LoaderEvents, NoopEvents, TracingEvents};
pub use fs_source::FsScriptSource;
pub use loader::{LoaderState, ReloadSummary, ScriptLoader, derive_name};
pub use memory::MemoryScriptSource;
pub use registry::{ScriptMetadata, ScriptRegistry};
pub use source::{ScriptEntry, ScriptFile, ScriptSource, Subscription, WatchEvent, WatchSink};
