// Library root
// -----------
// The binary (`main.rs`) parses arguments and hands off to these modules.
//
// Module responsibilities:
// - `config`: loads and validates the migration config file.
// - `resource`: per-type descriptors (endpoints, list shape, staging layout).
// - `api`: HTTP transport and typed calls against the management API.
// - `staging`: the local directory holding exported snapshots.
// - `export` / `import`: the two halves of the migration for one type.
// - `migrate`: sequences both phases for the `all` and `specific` commands.
// - `ui`: prompts, progress bars and banners.
pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod migrate;
pub mod resource;
pub mod staging;
pub mod ui;

#[cfg(test)]
mod test_support;
