//! Small topologies shared by the unit tests.

use crate::api::physical_cluster_dto::PhysicalClusterDto;
use crate::api::scheduler_config_dto::ClusterConfigDto;
use crate::domain::topology::cell_store::CellStore;
use crate::loader::parser::parse_json_str;

/// rack0 -> node0, node1 -> 2 switches each -> 2 GPUs each. Switch node1/1 is pinnable as "pin-0".
pub(crate) const RACK_TOPOLOGY: &str = r#"{
    "cellTypes": {
        "GPU": {},
        "SWITCH": { "childCellType": "GPU", "childCellNumber": 2 },
        "NODE": { "childCellType": "SWITCH", "childCellNumber": 2, "isNodeLevel": true },
        "RACK": { "childCellType": "NODE", "childCellNumber": 2 }
    },
    "physicalCells": [
        { "cellType": "RACK", "cellAddress": "rack0", "cellChildren": [
            { "cellAddress": "node0" },
            { "cellAddress": "node1", "cellChildren": [ {}, { "pinnedCellId": "pin-0" } ] }
        ] }
    ]
}"#;

pub(crate) fn single_rack_store() -> CellStore {
    let dto: PhysicalClusterDto = parse_json_str(RACK_TOPOLOGY).unwrap();
    CellStore::from_dto(&dto).unwrap()
}

/// One node with two switches of two GPUs. Tenant "a" reserves one switch, tenant "b" nothing.
pub(crate) fn small_cluster_config() -> ClusterConfigDto {
    parse_json_str(
        r#"{
            "physicalCluster": {
                "cellTypes": {
                    "GPU": {},
                    "SWITCH": { "childCellType": "GPU", "childCellNumber": 2 },
                    "NODE": { "childCellType": "SWITCH", "childCellNumber": 2, "isNodeLevel": true }
                },
                "physicalCells": [ { "cellType": "NODE", "cellAddress": "node0" } ]
            },
            "virtualClusters": [
                { "name": "a", "virtualCells": [ { "cellType": "SWITCH", "cellNumber": 1 } ] },
                { "name": "b" }
            ],
            "scheduler": { "gracePeriodSeconds": 30 }
        }"#,
    )
    .unwrap()
}

/// The rack topology with tenant "a" owning node0 and pinning "pin-0", tenant "b" owning one switch.
pub(crate) fn rack_cluster_config() -> ClusterConfigDto {
    let physical: PhysicalClusterDto = parse_json_str(RACK_TOPOLOGY).unwrap();
    let mut config: ClusterConfigDto = parse_json_str(
        r#"{
            "physicalCluster": { "cellTypes": {}, "physicalCells": [] },
            "virtualClusters": [
                { "name": "a", "virtualCells": [ { "cellType": "NODE", "cellNumber": 1 } ], "pinnedCells": [ { "pinnedCellId": "pin-0" } ] },
                { "name": "b", "virtualCells": [ { "cellType": "SWITCH", "cellNumber": 1 } ] }
            ]
        }"#,
    )
    .unwrap();
    config.physical_cluster = physical;
    config
}

/// The rack topology carved finer than the requests: tenant "a" reserves two switches (all of
/// node0), tenant "c" two GPUs (the first switch of node1). Shared fallback is off.
pub(crate) fn fine_grained_cluster_config() -> ClusterConfigDto {
    let physical: PhysicalClusterDto = parse_json_str(RACK_TOPOLOGY).unwrap();
    let mut config: ClusterConfigDto = parse_json_str(
        r#"{
            "physicalCluster": { "cellTypes": {}, "physicalCells": [] },
            "virtualClusters": [
                { "name": "a", "virtualCells": [ { "cellType": "SWITCH", "cellNumber": 2 } ] },
                { "name": "c", "virtualCells": [ { "cellType": "GPU", "cellNumber": 2 } ] }
            ],
            "scheduler": { "allowSharedFallback": false }
        }"#,
    )
    .unwrap();
    config.physical_cluster = physical;
    config
}
