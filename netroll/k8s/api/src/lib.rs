#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod network_policy;
pub mod sql_instance;

pub use self::{network_policy::NetworkPolicy, sql_instance::SqlInstance};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference, Time};
pub use kube::{
    api::{Api, ApiResource, DynamicObject, ObjectMeta, PostParams, ResourceExt},
    Client, Error,
};
