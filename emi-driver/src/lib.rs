// SPDX-License-Identifier: Apache-2.0

//! Driver for a coverage-guided EMI (equivalence modulo inputs) exploration
//! of JVM programs.
//!
//! A registry directory holds a seed program, its runner script and every
//! variant derived from it. The [`controller::Controller`] repeatedly runs the
//! current variant to obtain a heap dump and a coverage trace, renders the
//! trace as a report, and hands that report to an external mutator which
//! writes the next variant.

pub mod checkpoint;
pub mod controller;
pub mod equivalence;
pub mod error;
pub mod executor;
pub mod jimple;
pub mod mutator;
pub mod preflight;
pub mod registry;
pub mod report_cli_error;
pub mod reporter;
pub mod subprocess;
pub mod toolchain_config;
pub mod variant_id;
