//! Sharelink Core Library
//!
//! Turns public cloud-drive share links into direct download URLs and renders
//! those URLs as ready-to-use commands for download clients.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`model`] - Canonical share-link record and file metadata
//! - [`resolver`] - Built-in provider catalog, custom parser registry, HTTP capability
//! - [`sandbox`] - Rhai-based execution of runtime-loaded resolver scripts
//! - [`clientlink`] - Download-metadata extraction and client-link encoders
//! - [`pipeline`] - Identify, resolve and render in one place

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clientlink;
pub mod model;
pub mod pipeline;
pub mod resolver;
pub mod sandbox;
pub mod user_agent;

// Re-export commonly used types
pub use clientlink::{
    ClientLinkGenerator, ClientLinkType, DownloadLinkMeta, GeneratedLinks, GenerationError,
    GeneratorRegistry,
};
pub use model::{FileInfo, ShareLinkInfo};
pub use pipeline::{LinkPipeline, Resolution};
pub use resolver::{
    BuiltinProvider, CompiledResolver, HttpFetch, LinkCache, MemoryLinkCache, ParserRegistry,
    RegistryError, ReqwestFetch, ResolveContext, ResolveError, ResolvedUrl, Resolver,
    ResolverConfig,
};
pub use sandbox::{SandboxError, SandboxLimits, ScriptedResolver};
