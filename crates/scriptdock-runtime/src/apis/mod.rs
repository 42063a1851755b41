//! Host APIs injected into script scopes.

pub mod console;

pub use console::ConsoleProvider;
