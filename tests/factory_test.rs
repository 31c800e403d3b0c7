// Integration tests for thread factory configuration and validation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use corral::pool::WorkerPool;
use corral::{
    BuildError, MAX_PRIORITY, MIN_PRIORITY, NamedThreadFactory, ThreadFactoryBuilder, single_pool,
};

fn worker_thread_name(factory: Arc<NamedThreadFactory>) -> Option<String> {
    let pool = single_pool(factory).unwrap();
    let (tx, rx) = mpsc::channel();
    pool.submit(move || {
        let current = std::thread::current();
        tx.send(current.name().map(str::to_string)).unwrap();
    })
    .unwrap();
    let name = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    pool.shutdown();
    assert!(pool.await_termination(Duration::from_secs(2)));
    name
}

#[test]
fn name_format_appends_a_sequence_suffix() {
    let factory = Arc::new(NamedThreadFactory::named("io").unwrap());
    assert_eq!(worker_thread_name(factory).as_deref(), Some("io-0"));
}

#[test]
fn name_format_substitutes_an_explicit_placeholder() {
    let factory = Arc::new(
        ThreadFactoryBuilder::new()
            .name_format("net-{}-worker")
            .build()
            .unwrap(),
    );
    assert_eq!(worker_thread_name(factory).as_deref(), Some("net-0-worker"));
}

#[test]
fn sequence_ids_are_monotonic_across_spawns() {
    let factory = Arc::new(NamedThreadFactory::named("seq").unwrap());
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    for _ in 0..3 {
        let seen = seen.clone();
        let handle = factory
            .spawn(Box::new(move || {
                let current = std::thread::current();
                seen.lock()
                    .unwrap()
                    .push(current.name().unwrap().to_string());
            }))
            .unwrap();
        handle.join().unwrap();
    }
    assert_eq!(*seen.lock().unwrap(), vec!["seq-0", "seq-1", "seq-2"]);
}

#[test]
fn default_factory_leaves_threads_unnamed() {
    let factory = Arc::new(NamedThreadFactory::default());
    assert_eq!(worker_thread_name(factory), None);
}

#[test]
fn empty_name_format_is_a_build_error() {
    let result = ThreadFactoryBuilder::new().name_format("").build();
    assert!(matches!(result, Err(BuildError::EmptyNameFormat)));
}

#[test]
fn priority_out_of_range_is_a_build_error() {
    for value in [MIN_PRIORITY - 1, MAX_PRIORITY + 1, 100] {
        let result = ThreadFactoryBuilder::new().priority(value).build();
        assert!(matches!(
            result,
            Err(BuildError::PriorityOutOfRange { .. })
        ));
    }
}

#[test]
fn priority_within_range_builds() {
    for value in [MIN_PRIORITY, 0, MAX_PRIORITY] {
        assert!(ThreadFactoryBuilder::new().priority(value).build().is_ok());
    }
}

#[test]
fn zero_stack_size_is_a_build_error() {
    let result = ThreadFactoryBuilder::new().stack_size(0).build();
    assert!(matches!(result, Err(BuildError::ZeroStackSize)));
}

#[test]
fn stack_size_is_applied_to_workers() {
    let factory = Arc::new(
        ThreadFactoryBuilder::new()
            .name_format("stack")
            .stack_size(1 << 20)
            .build()
            .unwrap(),
    );
    let pool = single_pool(factory).unwrap();
    let (tx, rx) = mpsc::channel();
    pool.submit(move || {
        tx.send(()).unwrap();
    })
    .unwrap();
    rx.recv_timeout(Duration::from_secs(2)).unwrap();
    pool.shutdown();
    assert!(pool.await_termination(Duration::from_secs(2)));
}

#[test]
fn panic_handler_observes_job_panics_and_the_worker_survives() {
    let observed = Arc::new(AtomicBool::new(false));
    let observed_name = Arc::new(std::sync::Mutex::new(String::new()));
    let factory = {
        let observed = observed.clone();
        let observed_name = observed_name.clone();
        Arc::new(
            ThreadFactoryBuilder::new()
                .name_format("panicky")
                .panic_handler(move |thread, _payload| {
                    observed.store(true, Ordering::SeqCst);
                    *observed_name.lock().unwrap() = thread.to_string();
                })
                .build()
                .unwrap(),
        )
    };

    let pool = single_pool(factory).unwrap();
    pool.submit(|| panic!("boom")).unwrap();

    let done = Arc::new(AtomicUsize::new(0));
    {
        let done = done.clone();
        pool.submit(move || {
            done.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while done.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert!(observed.load(Ordering::SeqCst));
    assert_eq!(&*observed_name.lock().unwrap(), "panicky-0");

    pool.shutdown();
    assert!(pool.await_termination(Duration::from_secs(2)));
}

#[test]
fn decorated_base_factory_supplies_the_builder() {
    struct BigStack;

    impl corral::ThreadFactory for BigStack {
        fn thread_builder(&self) -> std::thread::Builder {
            std::thread::Builder::new().stack_size(2 << 20)
        }
    }

    let factory = Arc::new(
        ThreadFactoryBuilder::new()
            .name_format("decorated")
            .base(Arc::new(BigStack))
            .build()
            .unwrap(),
    );
    assert_eq!(worker_thread_name(factory).as_deref(), Some("decorated-0"));
}
