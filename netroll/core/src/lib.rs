#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod handler;
pub mod instance;
pub mod policy;
pub mod reconcile;


pub use self::{
    handler::{Ensured, InstanceHandler},
    instance::{extract, InstanceDescriptor, OwnerKinds, SkipReason},
    policy::{build, policy_name, DesiredPolicy},
    reconcile::{Outcome, PolicyStore, Reconciler},
};
