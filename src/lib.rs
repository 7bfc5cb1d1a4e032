//! plantd — an HTTP gateway that renders PlantUML markup to images by
//! driving the PlantUML jar as a subprocess.
//!
//! Layers mirror the request flow: `config` resolves the immutable
//! [`config::Settings`] once at startup, `domain` holds the format
//! allow-list and job lifecycle, `application` owns the render pipeline
//! (workspace allocation, subprocess invocation, artifact registry), and
//! `infra` provides telemetry and the axum surface.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
