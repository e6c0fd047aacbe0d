use crate::InstanceDescriptor;
use netroll_k8s_api::{
    network_policy::{
        IPBlock, NetworkPolicy, NetworkPolicyEgressRule, NetworkPolicyPeer, NetworkPolicySpec,
        APP_LABEL, CREATED_BY, CREATED_BY_ANNOTATION, POLICY_TYPE_EGRESS,
    },
    sql_instance, LabelSelector, ObjectMeta,
};

/// A network policy as it should exist in the cluster, along with the key it
/// is stored under.
#[derive(Clone, Debug, PartialEq)]
pub struct DesiredPolicy {
    pub namespace: String,
    pub name: String,
    pub policy: NetworkPolicy,
}

/// Names the policy for an owner's instance.
pub fn policy_name(owner: &str, instance: &str) -> String {
    format!("db-{owner}-{instance}")
}

/// Computes the egress-only network policy that limits the owner's pods to
/// the instance's addresses.
pub fn build(instance: &InstanceDescriptor) -> DesiredPolicy {
    let name = policy_name(&instance.owner, &instance.name);

    let egress = instance
        .addresses()
        .map(|addr| NetworkPolicyEgressRule {
            to: Some(vec![NetworkPolicyPeer {
                ip_block: Some(IPBlock {
                    cidr: format!("{addr}/32"),
                    except: None,
                }),
                ..Default::default()
            }]),
            ports: None,
        })
        .collect();

    let policy = NetworkPolicy {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(instance.namespace.clone()),
            annotations: Some(
                [(CREATED_BY_ANNOTATION.to_string(), CREATED_BY.to_string())]
                    .into_iter()
                    .collect(),
            ),
            owner_references: Some(vec![sql_instance::owner_reference(
                &instance.name,
                &instance.uid,
            )]),
            ..Default::default()
        },
        spec: Some(NetworkPolicySpec {
            pod_selector: LabelSelector {
                match_labels: Some(
                    [(APP_LABEL.to_string(), instance.owner.clone())]
                        .into_iter()
                        .collect(),
                ),
                match_expressions: None,
            },
            policy_types: Some(vec![POLICY_TYPE_EGRESS.to_string()]),
            egress: Some(egress),
            ingress: None,
        }),
        ..Default::default()
    };

    DesiredPolicy {
        namespace: instance.namespace.clone(),
        name,
        policy,
    }
}
