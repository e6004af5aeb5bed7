// End-to-end replays through the analytical kernel
use etsim_core::prelude::*;
use etsim_core::scheduling::{find_invalid_nodes, validate_node, OperatorStatistics, ResourceClass};
use std::fs;

const MIXED_TRACE: &str = r#"[
    {"id": 0, "name": "load_weights", "type": "MEM_LOAD_NODE",
     "tensor_loc": "remote", "tensor_size": 4096},
    {"id": 1, "name": "fwd", "type": "COMP_NODE", "runtime": 12, "data_deps": [0]},
    {"id": 2, "name": "fwd_gpu", "type": "COMP_NODE", "is_cpu_op": false,
     "runtime": 30, "data_deps": [0]},
    {"id": 3, "name": "grad_sync", "type": "COMM_COLL_NODE", "comm_type": "all_reduce",
     "comm_size": 65536, "data_deps": [1, 2]},
    {"id": 4, "name": "send_act", "type": "COMM_SEND_NODE", "comm_dst": 1,
     "comm_size": 1024, "comm_tag": 5, "data_deps": [1]},
    {"id": 5, "name": "recv_grad", "type": "COMM_RECV_NODE", "comm_src": 1,
     "comm_size": 1024, "comm_tag": 6, "ctrl_deps": [4]},
    {"id": 6, "name": "marker", "type": "INVALID_NODE", "ctrl_deps": [3, 5]},
    {"id": 7, "name": "store_ckpt", "type": "MEM_STORE_NODE",
     "tensor_loc": "remote", "tensor_size": 2048, "ctrl_deps": [6]}
]"#;

fn replay(config: EngineConfig, trace: &str) -> EtsimResult<Workload<TraceGraph>> {
    let graph = TraceGraph::from_json_str(trace)?;
    let mut workload = Workload::new(config, graph)?;
    let mut kernel = AnalyticalKernel::new(AnalyticalConfig::default())?;
    run_to_completion(&mut workload, &mut kernel)?;
    Ok(workload)
}

fn timings(workload: &Workload<TraceGraph>) -> Vec<(u64, u64, Option<u64>)> {
    workload
        .statistics()
        .records()
        .map(|r: &OperatorStatistics| (r.node_id, r.start, r.end))
        .collect()
}

#[test]
fn test_mixed_trace_runs_to_completion() {
    let workload = replay(EngineConfig::standard(), MIXED_TRACE).unwrap();
    assert!(workload.is_finished());
    assert_eq!(workload.graph().remaining(), 0);
    assert_eq!(workload.in_flight(), 0);
    for class in ResourceClass::ALL {
        assert_eq!(workload.resources().in_flight(class), 0);
    }

    let report = workload.report().unwrap();
    assert_eq!(Some(report.wall_time), workload.finish_tick());
    for op_type in [
        OperatorType::Cpu,
        OperatorType::Gpu,
        OperatorType::Comm,
        OperatorType::RemoteMem,
        OperatorType::Invalid,
    ] {
        assert!(report.type_time.contains_key(&op_type), "{:?}", op_type);
    }
    assert_eq!(report.type_time[&OperatorType::Cpu], 12_000);
    assert_eq!(report.type_time[&OperatorType::Gpu], 30_000);
    assert_eq!(report.type_time[&OperatorType::Invalid], 0);
}

#[test]
fn test_records_respect_dependencies() {
    let workload = replay(EngineConfig::standard(), MIXED_TRACE).unwrap();
    let stats = workload.statistics();
    let end = |id| stats.get(id).unwrap().end.unwrap();
    let start = |id| stats.get(id).unwrap().start;

    assert!(start(1) >= end(0));
    assert!(start(2) >= end(0));
    assert!(start(3) >= end(1).max(end(2)));
    assert!(start(5) >= end(4));
    assert!(start(7) >= end(6));
    for record in stats.records() {
        assert!(record.end.unwrap() >= record.start);
    }
}

#[test]
fn test_replay_is_deterministic() {
    let first = replay(EngineConfig::standard(), MIXED_TRACE).unwrap();
    let second = replay(EngineConfig::standard(), MIXED_TRACE).unwrap();
    assert_eq!(timings(&first), timings(&second));
    assert_eq!(first.report(), second.report());

    let config = EngineConfig::roofline(500.0, 20.0).lenient();
    let first = replay(config.clone(), MIXED_TRACE).unwrap();
    let second = replay(config, MIXED_TRACE).unwrap();
    assert_eq!(timings(&first), timings(&second));
}

#[test]
fn test_replay_only_uses_recorded_runtimes() {
    let trace = r#"[
        {"id": 0, "type": "MEM_LOAD_NODE", "runtime": 3},
        {"id": 1, "type": "COMM_SEND_NODE", "runtime": 0, "data_deps": [0]}
    ]"#;
    let workload = replay(EngineConfig::replay(), trace).unwrap();
    let stats = workload.statistics();
    assert_eq!(stats.get(0).unwrap().end, Some(3000));
    assert_eq!(stats.get(1).unwrap().end, Some(3001));
    assert_eq!(workload.finish_tick(), Some(3001));
}

#[test]
fn test_roofline_costs_cpu_compute() {
    let trace = r#"[
        {"id": 0, "type": "COMP_NODE", "num_ops": 1000, "tensor_size": 100},
        {"id": 1, "type": "COMP_NODE", "num_ops": 50000, "tensor_size": 900,
         "data_deps": [0]}
    ]"#;
    let workload = replay(EngineConfig::roofline(100.0, 10.0), trace).unwrap();
    let stats = workload.statistics();

    // 10 ops/byte sits on the ridge point: 100 ops/tick, 10 ticks
    let first = stats.get(0).unwrap();
    assert_eq!(first.end, Some(10));
    assert_eq!(first.is_memory_bound, Some(false));

    // 50000 ops over 1000 bytes: compute bound, 500 ticks
    let second = stats.get(1).unwrap();
    assert_eq!(second.end.unwrap() - second.start, 500);

    let report = workload.report().unwrap();
    assert!(report.utilizations.compute_bound_percentage > 0.9);
}

#[test]
fn test_blocked_roofline_child_after_parent_removed() {
    let trace = r#"[
        {"id": 0, "type": "MEM_LOAD_NODE", "tensor_loc": "remote", "tensor_size": 900},
        {"id": 1, "type": "COMP_NODE", "num_ops": 1000, "tensor_size": 100, "data_deps": [0]},
        {"id": 2, "type": "COMP_NODE", "num_ops": 1000, "tensor_size": 100, "data_deps": [0]}
    ]"#;
    let workload = replay(EngineConfig::roofline(1000.0, 10.0), trace).unwrap();
    let stats = workload.statistics();
    let first = stats.get(1).unwrap();
    let second = stats.get(2).unwrap();
    assert_eq!(second.start, first.end.unwrap());
    assert_eq!(second.end.unwrap() - second.start, 100);
}

#[test]
fn test_gpu_roofline_strict_vs_lenient() {
    let trace = r#"[
        {"id": 0, "type": "COMP_NODE", "is_cpu_op": false, "runtime": 4},
        {"id": 1, "type": "COMP_NODE", "runtime": 2, "num_ops": 10,
         "tensor_size": 10, "data_deps": [0]}
    ]"#;

    let err = replay(EngineConfig::roofline(10.0, 10.0), trace).unwrap_err();
    assert!(matches!(err, EtsimError::Unsupported(_)));

    let workload = replay(EngineConfig::roofline(10.0, 10.0).lenient(), trace).unwrap();
    let skipped = workload.statistics().get(0).unwrap();
    assert_eq!(skipped.op_type, OperatorType::Invalid);
    assert_eq!(skipped.start, skipped.end.unwrap());
    assert!(workload.is_finished());
}

#[test]
fn test_unsupported_collective() {
    let trace = r#"[
        {"id": 0, "type": "COMM_COLL_NODE", "comm_type": "barrier", "comm_size": 0},
        {"id": 1, "type": "COMP_NODE", "runtime": 1, "data_deps": [0]}
    ]"#;
    let err = replay(EngineConfig::standard(), trace).unwrap_err();
    assert!(matches!(
        err,
        EtsimError::UnsupportedCollective { node: 0, .. }
    ));

    let workload = replay(EngineConfig::standard().lenient(), trace).unwrap();
    assert_eq!(workload.finish_tick(), Some(1000));
}

#[test]
fn test_cycle_stalls() {
    let trace = r#"[
        {"id": 0, "type": "COMP_NODE", "runtime": 1, "data_deps": [1]},
        {"id": 1, "type": "COMP_NODE", "runtime": 1, "data_deps": [0]}
    ]"#;
    let err = replay(EngineConfig::standard(), trace).unwrap_err();
    assert!(matches!(err, EtsimError::Stalled { remaining: 2 }));
}

#[test]
fn test_empty_trace_finishes_immediately() {
    let workload = replay(EngineConfig::standard(), "[]").unwrap();
    assert_eq!(workload.finish_tick(), Some(0));
    assert_eq!(workload.report().unwrap().wall_time, 0);
}

#[test]
fn test_parallel_capacity_shortens_wall_time() {
    let trace = r#"[
        {"id": 0, "type": "COMP_NODE", "runtime": 5},
        {"id": 1, "type": "COMP_NODE", "runtime": 5},
        {"id": 2, "type": "COMP_NODE", "runtime": 5}
    ]"#;
    let serial = replay(EngineConfig::standard(), trace).unwrap();
    assert_eq!(serial.finish_tick(), Some(15_000));

    let wide = EngineConfig::standard().with_resources(ResourceCapacity {
        cpu_compute: 3,
        ..ResourceCapacity::default()
    });
    let parallel = replay(wide, trace).unwrap();
    assert_eq!(parallel.finish_tick(), Some(5_000));
    // overlapping ops are counted once
    assert_eq!(
        parallel.report().unwrap().type_time[&OperatorType::Cpu],
        5_000
    );
}

#[test]
fn test_files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("job.2.json"), MIXED_TRACE).unwrap();
    fs::write(dir.path().join("groups.json"), r#"{"0": [0, 1], "1": [2, 3]}"#).unwrap();
    let config_path = dir.path().join("engine.yaml");
    fs::write(
        &config_path,
        format!(
            "sys_id: 2\nnetwork_dims: 2\ncomm_group_file: {}\n",
            dir.path().join("groups.json").display()
        ),
    )
    .unwrap();

    let config = EngineConfig::from_file(&config_path).unwrap();
    let prefix = dir.path().join("job");
    let graph = TraceGraph::load_for_system(prefix.to_str().unwrap(), config.sys_id).unwrap();
    let mut workload = Workload::new(config, graph).unwrap();
    assert_eq!(workload.comm_group().unwrap().npus, vec![2, 3]);

    let mut kernel = AnalyticalKernel::new(AnalyticalConfig::default()).unwrap();
    run_to_completion(&mut workload, &mut kernel).unwrap();

    let json = serde_json::to_string(workload.report().unwrap()).unwrap();
    assert!(json.contains("\"wall_time\""));
    assert!(json.contains("\"cpu\""));
}

#[test]
fn test_zero_bandwidth_kernel_rejected_before_replay() {
    let trace = r#"[
        {"id": 0, "type": "COMP_NODE", "runtime": 1},
        {"id": 1, "type": "MEM_LOAD_NODE", "tensor_loc": "remote",
         "tensor_size": 64, "data_deps": [0]}
    ]"#;
    let graph = TraceGraph::from_json_str(trace).unwrap();
    assert!(Workload::new(EngineConfig::standard(), graph).is_ok());

    let result = AnalyticalKernel::new(AnalyticalConfig {
        remote_mem_bandwidth: 0.0,
        ..Default::default()
    });
    assert!(matches!(result, Err(EtsimError::Config(_))));
}

#[test]
fn test_preflight_reports_every_bad_node() {
    let trace = r#"[
        {"id": 0, "type": "COMP_NODE", "runtime": 1},
        {"id": 1, "type": "COMM_SEND_NODE", "data_deps": [0]},
        {"id": 2, "type": "COMM_COLL_NODE", "comm_type": "barrier", "comm_size": 0},
        {"id": 3, "type": "MEM_LOAD_NODE", "tensor_loc": "remote", "tensor_size": 8}
    ]"#;
    let graph = TraceGraph::from_json_str(trace).unwrap();
    let config = EngineConfig::standard();

    let invalid = find_invalid_nodes(graph.nodes(), &graph, &config);
    let ids: Vec<_> = invalid.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(invalid[0].1.contains("comm_dst"));
    assert!(validate_node(graph.nodes().next().unwrap(), &graph, &config).is_ok());

    // replay stops at the first bad node it reaches
    let err = replay(config, trace).unwrap_err();
    assert!(matches!(
        err,
        EtsimError::UnsupportedCollective { node: 2, .. }
    ));
}

#[test]
fn test_missing_trace_file() {
    let err = TraceGraph::load_for_system("/definitely/missing/job", 0).unwrap_err();
    assert!(matches!(err, EtsimError::TraceLoad(_)));
}
