//! Object model wire encoding.
//!
//! A device's routes are projected into the nested structure the gateway
//! expects in `device_register` and `write`:
//!
//! ```text
//! [{"objectId":3200,"objectInstances":[
//!     {"objectInstanceId":0,"resources":[
//!         {"resourceId":5501,"operations":3,"type":"int","value":"AAAACg=="}]}]}]
//! ```
//!
//! Objects, instances and resources are sorted by id, so the same route set
//! always encodes to the same bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::route::{Operations, RoutePath};
use super::value::{ResourceKind, ResourceValue};
use crate::codec::ValueCodec;

/// Per-resource options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceOptions {
    /// Allowed operations.
    pub operations: Operations,
    /// Whether the gateway may observe the resource.
    pub observable: bool,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            operations: Operations::GET_PUT,
            observable: true,
        }
    }
}

impl ResourceOptions {
    /// Options with the given operations, observable.
    pub fn with_operations(operations: Operations) -> Self {
        Self {
            operations,
            ..Self::default()
        }
    }
}

/// A registered resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEntry {
    /// Kind fixed at creation.
    pub kind: ResourceKind,
    /// Current value; `None` for functions.
    pub value: Option<ResourceValue>,
    /// Options fixed at creation.
    pub options: ResourceOptions,
}

/// Wire form of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResource {
    /// Resource id, the last route segment.
    pub resource_id: u32,
    /// Allowed-operations bitmask.
    pub operations: u8,
    /// Kind name, serialized as `type`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Base64 of the raw value bytes.
    pub value: String,
}

/// Wire form of one object instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireInstance {
    /// Instance id, the middle route segment.
    pub object_instance_id: u32,
    /// Resources sorted by id.
    pub resources: Vec<WireResource>,
}

/// Wire form of one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireObject {
    /// Object id, the first route segment.
    pub object_id: u32,
    /// Instances sorted by id.
    pub object_instances: Vec<WireInstance>,
}

impl WireResource {
    fn new(route: &RoutePath, entry: &ResourceEntry) -> Self {
        let bytes = ValueCodec::encode_slot(entry.value.as_ref());
        Self {
            resource_id: route.resource_id,
            operations: entry.options.operations.bits(),
            kind: entry.kind.wire_type().to_string(),
            value: ValueCodec::to_base64(&bytes),
        }
    }
}

/// Build the object model for a set of routes, in any order.
pub fn build_object_model<'a, I>(routes: I) -> Vec<WireObject>
where
    I: IntoIterator<Item = (&'a RoutePath, &'a ResourceEntry)>,
{
    let mut tree: BTreeMap<u32, BTreeMap<u32, Vec<WireResource>>> = BTreeMap::new();
    for (route, entry) in routes {
        tree.entry(route.object_id)
            .or_default()
            .entry(route.instance_id)
            .or_default()
            .push(WireResource::new(route, entry));
    }

    tree.into_iter()
        .map(|(object_id, instances)| WireObject {
            object_id,
            object_instances: instances
                .into_iter()
                .map(|(object_instance_id, mut resources)| {
                    resources.sort_by_key(|r| r.resource_id);
                    WireInstance {
                        object_instance_id,
                        resources,
                    }
                })
                .collect(),
        })
        .collect()
}
