//! Executor handler lifecycle across repeated solver calls.

use std::sync::Arc;

use ogl_executor::{
    BackendKind, ExecutionContext, ExecutorError, ExecutorHandler, ObjectRegistry, SerialGroup,
    SolverControls, StaticGroup, StaticRuntime,
};

fn serial_ctx(runtime: StaticRuntime) -> ExecutionContext {
    ExecutionContext::new(Arc::new(SerialGroup), Arc::new(runtime))
}

fn controls(executor: &str) -> SolverControls {
    SolverControls::new().with("executor", executor)
}

#[test]
fn test_reference_scenario() {
    let registry = Arc::new(ObjectRegistry::new());
    let ctx = serial_ctx(StaticRuntime::reference_only());

    let handler = ExecutorHandler::new(&registry, &controls("reference"), "p", &ctx)
        .expect("reference handler should build");
    let exec = handler.device_executor().expect("reference executor");
    assert_eq!(exec.kind(), BackendKind::Reference);
    assert_eq!(exec.device_id(), None);

    let host = handler.host_executor().expect("host executor");
    assert!(Arc::ptr_eq(&exec, &host), "reference executor is its own master");
    assert_eq!(registry.keys::<ogl_executor::Executor>(), vec!["reference_p".to_string()]);
}

#[test]
fn test_default_backend_is_reference() {
    let registry = Arc::new(ObjectRegistry::new());
    let ctx = serial_ctx(StaticRuntime::reference_only());
    let handler = ExecutorHandler::new(&registry, &SolverControls::new(), "U", &ctx).unwrap();
    assert_eq!(handler.backend_name(), "reference");
    assert_eq!(handler.key(), "reference_U");
    assert!(!handler.force_host_buffer());
}

#[test]
fn test_every_compiled_backend_matches_request() {
    let registry = Arc::new(ObjectRegistry::new());
    let ctx = serial_ctx(StaticRuntime::all_backends(2));
    for kind in BackendKind::ALL {
        let handler = ExecutorHandler::new(&registry, &controls(kind.name()), "p", &ctx).unwrap();
        let exec = handler.device_executor().unwrap();
        assert_eq!(exec.kind(), kind);
        assert_eq!(exec.device_id().is_some(), kind.is_device());

        let host = handler.host_executor().unwrap();
        if kind.is_device() {
            assert_eq!(host.kind(), BackendKind::Reference);
            assert_eq!(exec.device_id(), Some(0));
        } else {
            assert!(Arc::ptr_eq(&host, &exec));
        }
    }
    assert_eq!(registry.len(), BackendKind::ALL.len());
}

#[test]
fn test_repeated_construction_reuses_executor() {
    let registry = Arc::new(ObjectRegistry::new());
    let ctx = serial_ctx(StaticRuntime::all_backends(1));

    let first = ExecutorHandler::new(&registry, &controls("cuda"), "p", &ctx).unwrap();
    let exec_a = first.device_executor().unwrap();
    drop(first);

    let second = ExecutorHandler::new(&registry, &controls("cuda"), "p", &ctx).unwrap();
    let exec_b = second.device_executor().unwrap();
    assert!(Arc::ptr_eq(&exec_a, &exec_b));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_fields_get_independent_executors() {
    let registry = Arc::new(ObjectRegistry::new());
    let ctx = serial_ctx(StaticRuntime::all_backends(1));

    let p = ExecutorHandler::new(&registry, &controls("omp"), "p", &ctx).unwrap();
    let u = ExecutorHandler::new(&registry, &controls("omp"), "U", &ctx).unwrap();
    assert_ne!(p.key(), u.key());

    let exec_p = p.device_executor().unwrap();
    let exec_u = u.device_executor().unwrap();
    assert!(!Arc::ptr_eq(&exec_p, &exec_u));
    assert_eq!(exec_p.kind(), exec_u.kind());
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_executor_outlives_handler() {
    let registry = Arc::new(ObjectRegistry::new());
    let ctx = serial_ctx(StaticRuntime::reference_only());
    let exec = {
        let handler = ExecutorHandler::new(&registry, &controls("reference"), "p", &ctx).unwrap();
        handler.device_executor().unwrap()
    };
    assert_eq!(exec.kind(), BackendKind::Reference);
    // one clone held here, one owned by the registry
    assert_eq!(Arc::strong_count(&exec), 2);
}

#[test]
fn test_unsupported_backend_is_distinct_from_not_compiled() {
    let registry = Arc::new(ObjectRegistry::new());
    let ctx = serial_ctx(StaticRuntime::reference_only());

    let unsupported = ExecutorHandler::new(&registry, &controls("opencl"), "p", &ctx)
        .err()
        .expect("opencl is not a backend");
    assert_eq!(
        unsupported,
        ExecutorError::UnsupportedBackend {
            name: "opencl".to_string()
        }
    );

    let handler = ExecutorHandler::new(&registry, &controls("cuda"), "p", &ctx)
        .expect("known backend name builds a handler");
    let not_compiled = handler.device_executor().unwrap_err();
    assert_eq!(
        not_compiled,
        ExecutorError::BackendNotAvailable {
            backend: BackendKind::Cuda
        }
    );
    assert!(not_compiled.to_string().contains("Recompile"));
    assert!(registry.is_empty(), "failed builds must not be cached");
}

#[test]
fn test_backend_name_is_not_normalized() {
    let registry = Arc::new(ObjectRegistry::new());
    let ctx = serial_ctx(StaticRuntime::all_backends(1));
    let err = ExecutorHandler::new(&registry, &controls("Reference"), "p", &ctx)
        .err()
        .expect("names are case-sensitive");
    assert!(matches!(err, ExecutorError::UnsupportedBackend { .. }));
}

#[test]
fn test_serial_run_has_no_communicators() {
    let registry = Arc::new(ObjectRegistry::new());
    let ctx = serial_ctx(StaticRuntime::all_backends(4));
    let handler = ExecutorHandler::new(&registry, &controls("hip"), "p", &ctx).unwrap();
    assert_eq!(handler.device_assignment().device_index, 0);
    assert!(handler.device_communicator().is_none());
    assert!(handler.host_buffer_communicator().is_none());
    assert_eq!(handler.device_executor().unwrap().device_id(), Some(0));
}

#[test]
fn test_host_buffer_communicator_is_fresh_each_call() {
    let registry = Arc::new(ObjectRegistry::new());
    let group = Arc::new(StaticGroup::new(1, 4).unwrap());
    let ctx = ExecutionContext::new(group.clone(), Arc::new(StaticRuntime::all_backends(4)));
    let handler = ExecutorHandler::new(
        &registry,
        &controls("cuda").with("forceHostBuffer", true),
        "p",
        &ctx,
    )
    .unwrap();

    let a = handler.host_buffer_communicator().unwrap();
    let b = handler.host_buffer_communicator().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(a.force_host_buffer() && b.force_host_buffer());
    assert_eq!(a.rank(), 1);
    assert_eq!(a.size(), 4);
}

#[test]
fn test_device_communicator_is_stable_per_handler() {
    let registry = Arc::new(ObjectRegistry::new());
    let group = Arc::new(StaticGroup::new(0, 2).unwrap());
    let ctx = ExecutionContext::new(group.clone(), Arc::new(StaticRuntime::all_backends(1)));
    let handler = ExecutorHandler::new(&registry, &controls("hip"), "p", &ctx).unwrap();

    let a = handler.device_communicator().unwrap();
    let b = handler.device_communicator().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!a.force_host_buffer());
}

#[test]
fn test_device_communicator_rebuilt_while_executor_cached() {
    // The executor is cached per key but each handler builds its own
    // device communicator.
    let registry = Arc::new(ObjectRegistry::new());
    let group = Arc::new(StaticGroup::new(2, 4).unwrap());
    let ctx = ExecutionContext::new(group.clone(), Arc::new(StaticRuntime::all_backends(2)));

    let first = ExecutorHandler::new(&registry, &controls("dpcpp"), "p", &ctx).unwrap();
    // functor communicator + device communicator
    assert_eq!(group.communicators_created(), 2);
    let second = ExecutorHandler::new(&registry, &controls("dpcpp"), "p", &ctx).unwrap();
    assert_eq!(group.communicators_created(), 4);

    assert!(Arc::ptr_eq(
        &first.device_executor().unwrap(),
        &second.device_executor().unwrap()
    ));
    assert!(!Arc::ptr_eq(
        &first.device_communicator().unwrap(),
        &second.device_communicator().unwrap()
    ));
}

#[test]
fn test_invalid_ranks_per_gpu() {
    let registry = Arc::new(ObjectRegistry::new());
    let ctx = serial_ctx(StaticRuntime::reference_only());
    let err = ExecutorHandler::new(&registry, &controls("reference").with("ranksPerGPU", 0), "p", &ctx)
        .err()
        .expect("zero ranks per GPU is rejected");
    assert!(matches!(err, ExecutorError::InvalidSetting { ref key, .. } if key == "ranksPerGPU"));
}

#[test]
fn test_zero_ranks_per_gpu_rejected_before_communicators() {
    let registry = Arc::new(ObjectRegistry::new());
    let group = Arc::new(StaticGroup::new(3, 4).unwrap());
    let ctx = ExecutionContext::new(group.clone(), Arc::new(StaticRuntime::all_backends(2)));
    let err = ExecutorHandler::new(&registry, &controls("cuda").with("ranksPerGPU", 0), "p", &ctx)
        .err()
        .expect("zero ranks per GPU is rejected");
    assert!(matches!(err, ExecutorError::InvalidSetting { .. }));
    assert_eq!(group.communicators_created(), 0);
    assert!(registry.is_empty());
}

#[test]
fn test_handlers_from_threads_share_executor() {
    let registry = Arc::new(ObjectRegistry::new());
    let ctx = serial_ctx(StaticRuntime::all_backends(1));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let ctx = ctx.clone();
            std::thread::spawn(move || {
                let handler = ExecutorHandler::new(&registry, &controls("cuda"), "k", &ctx).unwrap();
                handler.device_executor().unwrap()
            })
        })
        .collect();
    let execs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(execs.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(registry.len(), 1);
}
