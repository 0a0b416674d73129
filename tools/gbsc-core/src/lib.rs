//! Compiler from a game project description to engine data sources.
//!
//! The pipeline runs in strict dependency order: used assets are resolved from
//! every reachable script, assets and scenes are precompiled (asset classes in
//! parallel), scripts are lowered against the precompiled tables, and all
//! generated files are collected into a single [`ArtifactSet`].
//!
//! Nothing in this crate spawns processes; building the generated tree is the
//! job of the `gbsc` crate.

pub mod compile;
pub mod encode;
pub mod error;
pub mod hash;
pub mod output;
pub mod platform;
pub mod precompile;
pub mod project;
pub mod report;
pub mod resolve;
pub mod schema;
pub mod script;
pub mod symbols;
pub mod template;
pub mod walk;

pub use compile::{CompileOptions, compile_project};
pub use encode::{AssetEncoder, TileEncoder};
pub use error::{CompileError, Result};
pub use hash::{ContentKey, StableHash, StableHasher};
pub use output::{ArtifactSet, CompiledData};
pub use platform::{MAX_NESTED_SCRIPT_DEPTH, PlatformLimits, TargetPlatform};
pub use project::ProjectResources;
pub use report::Reporter;
