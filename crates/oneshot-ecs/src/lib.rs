//! Oneshot ECS: Amazon ECS backend for ecs-oneshot
//!
//! Implements [`oneshot_core::TaskService`] on top of `aws-sdk-ecs`.
//!
//! - `EcsConfig`: region and credential overrides
//! - `EcsService`: list / register / run / wait / deregister
//! - `convert`: task definition model -> SDK request types

mod client;
pub mod convert;

pub use client::{EcsConfig, EcsService};
