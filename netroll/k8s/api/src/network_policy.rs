pub use k8s_openapi::api::networking::v1::{
    IPBlock, NetworkPolicy, NetworkPolicyEgressRule, NetworkPolicyPeer, NetworkPolicySpec,
};

/// Annotation recording which component manages a policy.
pub const CREATED_BY_ANNOTATION: &str = "nais.io/created-by";
pub const CREATED_BY: &str = "netroll";

/// Pod label naming the workload that a pod belongs to.
pub const APP_LABEL: &str = "app";

pub const POLICY_TYPE_EGRESS: &str = "Egress";

/// Returns the CIDRs of every `ipBlock` peer in the policy's egress rules, in
/// order.
pub fn egress_cidrs(policy: &NetworkPolicy) -> Vec<&str> {
    policy
        .spec
        .iter()
        .flat_map(|spec| spec.egress.iter().flatten())
        .flat_map(|rule| rule.to.iter().flatten())
        .filter_map(|peer| peer.ip_block.as_ref())
        .map(|block| block.cidr.as_str())
        .collect()
}
