mod common;

use std::collections::HashMap;

use common::{TWO_RACK_CLUSTER, gpu_request, new_scheduler};
use hived_scheduler::domain::request::scheduling_request::PodGroupSchedulingRequest;
use hived_scheduler::domain::scheduler::pod_group_state::PodGroupState;
use hived_scheduler::error::Error;

#[test]
fn test_restart_rebuilds_the_same_occupancy() {
    let (mut original, _clock) = new_scheduler(TWO_RACK_CLUSTER);
    let requests: Vec<PodGroupSchedulingRequest> = vec![
        gpu_request("prod", "RACK", "prod-train", 7, 2, 2),
        gpu_request("dev", "RACK", "dev-notebook", 2, 1, 1),
        gpu_request("dev", "RACK", "dev-pinned", 4, 1, 2).pinned_to("pin-0"),
        gpu_request("research", "RACK", "sweep", 3, 2, 4),
    ];
    for request in &requests {
        assert_eq!(original.schedule(request.clone()).unwrap().state, PodGroupState::Allocated);
    }

    let (mut restarted, _clock) = new_scheduler(TWO_RACK_CLUSTER);
    let placements: HashMap<String, _> =
        original.statuses().map(|s| (s.group.to_string(), s.physical_placement.clone().unwrap())).collect();
    for request in &requests {
        let status = restarted.restore(request.clone(), &placements[&request.pod_root_group.name]).unwrap();
        assert_eq!(status.state, PodGroupState::Allocated);
    }

    assert_eq!(serde_json::to_value(restarted.cluster_status()).unwrap(), serde_json::to_value(original.cluster_status()).unwrap());
    for status in original.statuses() {
        let twin = restarted.status(&status.group).unwrap();
        assert_eq!(twin.scope, status.scope);
        assert_eq!(twin.virtual_placement, status.virtual_placement);
    }
}

#[test]
fn test_restore_rejects_placements_that_do_not_fit_the_request() {
    let (mut original, _clock) = new_scheduler(TWO_RACK_CLUSTER);
    let placed = original.schedule(gpu_request("research", "RACK", "job", 3, 1, 2)).unwrap();
    let placement = placed.physical_placement.unwrap();

    let (mut restarted, _clock) = new_scheduler(TWO_RACK_CLUSTER);
    let wider = gpu_request("research", "RACK", "job", 3, 1, 4);
    assert!(matches!(restarted.restore(wider, &placement), Err(Error::ConfigMismatch(_))));

    let outside_pin = gpu_request("dev", "RACK", "job", 3, 1, 2).pinned_to("pin-0");
    let mut unpinned = placement.clone();
    unpinned.pods[0] = vec!["rack1/0/0/0".into(), "rack1/0/0/1".into()];
    assert!(matches!(restarted.restore(outside_pin, &unpinned), Err(Error::ConfigMismatch(_))));

    assert!(restarted.tracker().is_empty());
}
