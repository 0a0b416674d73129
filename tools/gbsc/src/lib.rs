//! Build orchestration for compiled game projects.
//!
//! [`make::build_project`] drives a whole build: the engine template is
//! ejected, the project is compiled to engine data with `gbsc-core`, and the
//! resulting tree is compiled and linked with an external toolchain. Every
//! stage takes a [`BuildContext`] so a build can be cancelled from another
//! thread, including any toolchain processes it has spawned.

pub mod cache;
pub mod cancel;
pub mod commands;
pub mod context;
pub mod env;
pub mod error;
pub mod fs_util;
pub mod link;
pub mod make;
pub mod rom_image;
pub mod rom_name;
pub mod scheduler;
pub mod spawn;
pub mod toolchain;
pub mod validate;
pub mod web;

pub use cancel::{CancellationToken, ProcessRegistry};
pub use context::BuildContext;
pub use env::{BuildEnv, BuildFeatures};
pub use error::{BuildError, Result};
pub use make::{BuildOptions, BuildOutput, BuildType, build_project};
pub use rom_name::rom_filename;
pub use toolchain::Toolchain;
