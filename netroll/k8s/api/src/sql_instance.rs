use crate::{ApiResource, DynamicObject, OwnerReference};

pub const GROUP: &str = "sql.cnrm.cloud.google.com";
pub const VERSION: &str = "v1beta1";
pub const API_VERSION: &str = "sql.cnrm.cloud.google.com/v1beta1";
pub const KIND: &str = "SQLInstance";
pub const PLURAL: &str = "sqlinstances";

/// Config Connector does not publish Rust bindings for its resources, so
/// instances are handled as untyped objects.
pub type SqlInstance = DynamicObject;

/// Describes the `sqlinstances` resource for dynamic API access.
pub fn api_resource() -> ApiResource {
    ApiResource {
        group: GROUP.to_string(),
        version: VERSION.to_string(),
        api_version: API_VERSION.to_string(),
        kind: KIND.to_string(),
        plural: PLURAL.to_string(),
    }
}

/// An owner reference pointing back at an instance, used so that the API
/// server garbage-collects dependents when the instance is deleted.
pub fn owner_reference(name: impl ToString, uid: impl ToString) -> OwnerReference {
    OwnerReference {
        api_version: API_VERSION.to_string(),
        kind: KIND.to_string(),
        name: name.to_string(),
        uid: uid.to_string(),
        ..Default::default()
    }
}

/// Reads a string field from the instance's `status` section.
///
/// Returns `None` when the status section is missing or is not an object,
/// when the field is missing, or when it is not a string.
pub fn status_str<'i>(instance: &'i SqlInstance, field: &str) -> Option<&'i str> {
    instance
        .data
        .get("status")
        .and_then(serde_json::Value::as_object)
        .and_then(|status| status.get(field))
        .and_then(serde_json::Value::as_str)
}
