#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use netroll_core as core;
pub use netroll_k8s_api as k8s;

mod args;
mod controller;
mod metrics;
mod store;

pub use self::{
    args::{Args, Config},
    controller::Context,
    metrics::ReconcileMetrics,
    store::{KubeStore, StoreError},
};
