//! # assets-parser
//!
//! Read `project.assets.json` (the restore metadata written by
//! `dotnet restore`) and turn it into a per-framework dependency graph.
//!
//! ## Overview
//!
//! - **assets**: serde model of the restore metadata, map order preserved
//! - **graph**: [`GraphBuilder`], breadth-first transitive expansion bounded
//!   by a depth limit, one entry per package and framework
//! - **entity**: [`Project`], [`TargetProfile`], [`Dependency`]
//!
//! ## Example
//!
//! ```ignore
//! use assets_parser::{AssetsFile, GraphBuilder};
//! use std::path::Path;
//!
//! let assets = AssetsFile::from_path(Path::new("obj/project.assets.json"))?;
//! let project = GraphBuilder::new(true, 2).build(&assets, Path::new("App.csproj"));
//! for profile in &project.profiles {
//!     for dep in &profile.dependencies {
//!         println!("{} {} (depth {})", dep.name, dep.resolved_version, dep.depth);
//!     }
//! }
//! ```

mod assets;
mod entity;
mod error;
mod graph;

pub use assets::{AssetsFile, DependencySpec, FrameworkSpec, OrderedMap, TargetLibrary};
pub use entity::{Dependency, Project, SkippedProfile, TargetProfile};
pub use error::{AssetsError, GraphError, GraphErrorKind};
pub use graph::GraphBuilder;
