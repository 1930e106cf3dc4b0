//! The worker host process (C1-C7 wiring) spec.md §6 describes but scopes
//! out of the core design: a `clap`-derived binary that assembles a
//! `TaskRepository`, `ControlChannel`, the source/target connector
//! registries and a `SchemaConverter` into one `TaskExecutor::execute`
//! call per invocation.

pub mod app;
pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod registries;

pub fn set_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("{info}");
    }));
}
