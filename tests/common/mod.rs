#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use hived_scheduler::api::scheduler_config_dto::ClusterConfigDto;
use hived_scheduler::domain::clock::clock_mock::MockClock;
use hived_scheduler::domain::request::pod_group_spec::PodGroupSpec;
use hived_scheduler::domain::request::scheduling_request::PodGroupSchedulingRequest;
use hived_scheduler::domain::scheduler::scheduler::Scheduler;
use hived_scheduler::loader::parser::parse_json_str;

pub const START_TIME: i64 = 10_000;

/// One node, two switches of two GPUs. Tenant "a" reserves one switch, tenant "b" nothing.
pub const SMALL_CLUSTER: &str = r#"{
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
    "scheduler": { "gracePeriodSeconds": 30, "candidateOrdering": "bestFit" }
}"#;

/// Two racks of two nodes (16 GPUs). "prod" reserves a node, "dev" a switch plus the pinned switch
/// "pin-0" in node1, "research" has no reservation.
pub const TWO_RACK_CLUSTER: &str = r#"{
    "physicalCluster": {
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
            ] },
            { "cellType": "RACK", "cellAddress": "rack1" }
        ]
    },
    "virtualClusters": [
        { "name": "prod", "virtualCells": [ { "cellType": "NODE", "cellNumber": 1 } ] },
        { "name": "dev", "virtualCells": [ { "cellType": "SWITCH", "cellNumber": 1 } ], "pinnedCells": [ { "pinnedCellId": "pin-0" } ] },
        { "name": "research" }
    ],
    "scheduler": { "gracePeriodSeconds": 60, "maxCommitRetries": 2 }
}"#;

/// One rack of two nodes, reserved in cells finer than the requests: "a" two switches (node0),
/// "c" two GPUs (the first switch of node1). No shared fallback.
pub const SPLIT_RESERVATION_CLUSTER: &str = r#"{
    "physicalCluster": {
        "cellTypes": {
            "GPU": {},
            "SWITCH": { "childCellType": "GPU", "childCellNumber": 2 },
            "NODE": { "childCellType": "SWITCH", "childCellNumber": 2, "isNodeLevel": true },
            "RACK": { "childCellType": "NODE", "childCellNumber": 2 }
        },
        "physicalCells": [
            { "cellType": "RACK", "cellAddress": "rack0", "cellChildren": [ { "cellAddress": "node0" }, { "cellAddress": "node1" } ] }
        ]
    },
    "virtualClusters": [
        { "name": "a", "virtualCells": [ { "cellType": "SWITCH", "cellNumber": 2 } ] },
        { "name": "c", "virtualCells": [ { "cellType": "GPU", "cellNumber": 2 } ] }
    ],
    "scheduler": { "allowSharedFallback": false }
}"#;

pub fn config(json: &str) -> ClusterConfigDto {
    parse_json_str(json).unwrap()
}

pub fn new_scheduler(json: &str) -> (Scheduler, MockClock) {
    let clock = MockClock::new(START_TIME);
    let scheduler = Scheduler::from_dto(&config(json), Arc::new(clock.clone())).unwrap();
    (scheduler, clock)
}

/// `pods` pods of `gpus` GPUs each.
pub fn gpu_request(vc: &str, chain: &str, name: &str, priority: i32, pods: u32, gpus: u32) -> PodGroupSchedulingRequest {
    PodGroupSchedulingRequest::new(vc, chain, priority, PodGroupSpec::uniform(name, pods, "GPU", gpus))
}

/// Addresses of every cell held by a group that currently holds cells. Panics on double booking.
pub fn held_cells(scheduler: &Scheduler) -> HashSet<String> {
    let mut held = HashSet::new();
    for status in scheduler.statuses().filter(|s| s.state.holds_cells()) {
        let placement = status.physical_placement.as_ref().expect("holding groups have a placement");
        for cell in placement.cells() {
            assert!(held.insert(cell.to_string()), "cell {} is held twice (last by {})", cell, status.group);
        }
    }
    held
}

/// Number of leaves reported as used by the cluster view.
pub fn used_leaves(scheduler: &Scheduler) -> usize {
    scheduler.cluster_status().chains.iter().flat_map(|chain| chain.cells.iter()).filter(|cell| cell.level == 1 && cell.used_leaf_cells > 0).count()
}
