use anyhow::{bail, Result};
use netroll_k8s_api::{sql_instance, ResourceExt, SqlInstance};
use std::{collections::BTreeSet, fmt};

const PUBLIC_IP_ADDRESS: &str = "publicIpAddress";
const PRIVATE_IP_ADDRESS: &str = "privateIpAddress";

/// The validated parts of an instance that a network policy is derived from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceDescriptor {
    pub uid: String,
    pub name: String,
    pub namespace: String,
    pub owner: String,
    addresses: Addresses,
}

/// At least one address is always known.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Addresses {
    Public(String),
    Private(String),
    Both { public: String, private: String },
}

/// Why an instance can't (yet) be turned into a policy.
///
/// None of these are permanent: instances are revisited on every update and
/// resync, so a skipped instance is picked up once it is ready.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("instance has no owner reference")]
    NoOwner,

    #[error("instance has {0} owner references, expected exactly one")]
    AmbiguousOwner(usize),

    #[error("instance is owned by a {0}, which is not a supported owner kind")]
    UnsupportedOwnerKind(String),

    #[error("instance has no IP addresses")]
    NoAddress,

    #[error("instance has no {0}")]
    MissingMetadata(&'static str),
}

/// The workload kinds that may own an instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnerKinds(BTreeSet<String>);

/// Converts an instance into a descriptor, or explains why it can't.
pub fn extract(
    instance: &SqlInstance,
    kinds: &OwnerKinds,
) -> Result<InstanceDescriptor, SkipReason> {
    let owner = owner(instance, kinds)?;

    let public = sql_instance::status_str(instance, PUBLIC_IP_ADDRESS);
    let private = sql_instance::status_str(instance, PRIVATE_IP_ADDRESS);
    let addresses = Addresses::new(public, private)
        .ok_or(SkipReason::NoAddress)?;

    let meta = &instance.metadata;
    let name = meta
        .name
        .clone()
        .ok_or(SkipReason::MissingMetadata("name"))?;
    let namespace = meta
        .namespace
        .clone()
        .ok_or(SkipReason::MissingMetadata("namespace"))?;
    let uid = meta.uid.clone().ok_or(SkipReason::MissingMetadata("uid"))?;

    Ok(InstanceDescriptor {
        uid,
        name,
        namespace,
        owner: owner.to_string(),
        addresses,
    })
}

fn owner<'i>(instance: &'i SqlInstance, kinds: &OwnerKinds) -> Result<&'i str, SkipReason> {
    match instance.owner_references() {
        [] => Err(SkipReason::NoOwner),
        [owner] if kinds.contains(&owner.kind) => Ok(owner.name.as_str()),
        [owner] => Err(SkipReason::UnsupportedOwnerKind(owner.kind.clone())),
        owners => Err(SkipReason::AmbiguousOwner(owners.len())),
    }
}

// === impl InstanceDescriptor ===

impl InstanceDescriptor {
    /// Builds a descriptor directly. Empty addresses are treated as absent,
    /// and at least one address must remain.
    pub fn new(
        uid: impl ToString,
        name: impl ToString,
        namespace: impl ToString,
        owner: impl ToString,
        public: Option<&str>,
        private: Option<&str>,
    ) -> Result<Self, SkipReason> {
        Ok(Self {
            uid: uid.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            owner: owner.to_string(),
            addresses: Addresses::new(public, private).ok_or(SkipReason::NoAddress)?,
        })
    }

    pub fn public_address(&self) -> Option<&str> {
        match &self.addresses {
            Addresses::Public(public) | Addresses::Both { public, .. } => Some(public.as_str()),
            Addresses::Private(_) => None,
        }
    }

    pub fn private_address(&self) -> Option<&str> {
        match &self.addresses {
            Addresses::Private(private) | Addresses::Both { private, .. } => Some(private.as_str()),
            Addresses::Public(_) => None,
        }
    }

    /// Known addresses, public first.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.public_address()
            .into_iter()
            .chain(self.private_address())
    }
}

// === impl Addresses ===

impl Addresses {
    fn new(public: Option<&str>, private: Option<&str>) -> Option<Self> {
        let public = public.filter(|a| !a.is_empty()).map(str::to_string);
        let private = private.filter(|a| !a.is_empty()).map(str::to_string);
        match (public, private) {
            (Some(public), Some(private)) => Some(Self::Both { public, private }),
            (Some(public), None) => Some(Self::Public(public)),
            (None, Some(private)) => Some(Self::Private(private)),
            (None, None) => None,
        }
    }
}

// === impl SkipReason ===

impl SkipReason {
    /// A stable, low-cardinality name for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoOwner => "no_owner",
            Self::AmbiguousOwner(_) => "ambiguous_owner",
            Self::UnsupportedOwnerKind(_) => "unsupported_owner_kind",
            Self::NoAddress => "no_address",
            Self::MissingMetadata(_) => "missing_metadata",
        }
    }
}

// === impl OwnerKinds ===

impl OwnerKinds {
    pub fn contains(&self, kind: &str) -> bool {
        self.0.contains(kind)
    }
}

impl Default for OwnerKinds {
    fn default() -> Self {
        Self(["Application", "Job"].into_iter().map(Into::into).collect())
    }
}

impl std::str::FromStr for OwnerKinds {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let kinds = s
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(Into::into)
            .collect::<BTreeSet<String>>();
        if kinds.is_empty() {
            bail!("at least one owner kind must be specified");
        }
        Ok(Self(kinds))
    }
}

impl fmt::Display for OwnerKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, kind) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(kind)?;
        }
        Ok(())
    }
}
