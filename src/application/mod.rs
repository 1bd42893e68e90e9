// SPDX-License-Identifier: MPL-2.0
//! Application layer - Ports between the pipeline and external collaborators.
//!
//! - [`port`]: Trait definitions (interfaces) for dependency inversion
//!
//! # Dependency Rule
//!
//! - Application layer depends on domain layer (uses domain types)
//! - Infrastructure layer implements application layer ports
//! - The playback pipeline only ever sees the port traits

pub mod port;
