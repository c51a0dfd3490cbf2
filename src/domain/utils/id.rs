use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// A string identifier tagged with the kind of object it names, so that e.g. a chain name
/// can never be passed where a virtual cluster name is expected.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T> {
    pub id: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(id: impl Into<String>) -> Self {
        Id { id: id.into(), _marker: PhantomData }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> From<Id<T>> for String {
    fn from(id_wrapper: Id<T>) -> Self {
        id_wrapper.id
    }
}

impl<T> From<&str> for Id<T> {
    fn from(id: &str) -> Self {
        Id::new(id)
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full_name = std::any::type_name::<T>();
        let clean_name = full_name.split("::").last().unwrap_or(full_name);
        let display_name = clean_name.replace("Tag", "Id");

        write!(f, "{}: {:?}", display_name, self.id)
    }
}

// Topology Tags
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct ChainTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct CellTypeTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct CellAddressTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct PinnedCellTag;

// Tenant Tags
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct VirtualClusterTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct VirtualCellAddressTag;

// Workload Tags
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct PodGroupTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct PodTag;

pub type ChainName = Id<ChainTag>;
pub type CellTypeName = Id<CellTypeTag>;
pub type CellAddress = Id<CellAddressTag>;
pub type PinnedCellId = Id<PinnedCellTag>;

pub type VirtualClusterName = Id<VirtualClusterTag>;
pub type VirtualCellAddress = Id<VirtualCellAddressTag>;

pub type PodGroupName = Id<PodGroupTag>;
pub type PodUid = Id<PodTag>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_names_the_id_kind() {
        let name = VirtualClusterName::new("vc-a");
        assert_eq!(format!("{:?}", name), "VirtualClusterId: \"vc-a\"");
        assert_eq!(name.to_string(), "vc-a");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let chain = ChainName::new("DGX2-V100");
        let json = serde_json::to_string(&chain).unwrap();
        assert_eq!(json, "\"DGX2-V100\"");

        let back: ChainName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chain);
    }
}
