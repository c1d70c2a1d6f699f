use arena::SyncHandle;
use criterion::{Criterion, criterion_group, criterion_main};
use std::sync::atomic::AtomicBool;
use tempfile::tempdir;

fn bench_lock_cycles(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let sync = SyncHandle::create(dir.path().join("sync")).unwrap();
    unsafe { sync.init(1).unwrap() };
    let shutdown = AtomicBool::new(false);

    c.bench_function("write_lock_cycle", |b| {
        b.iter(|| {
            let guard = sync.lock_write(&shutdown).unwrap();
            drop(guard);
        })
    });

    c.bench_function("read_lock_cycle", |b| {
        b.iter(|| {
            let guard = sync.lock_read(&shutdown).unwrap();
            drop(guard);
        })
    });
}

criterion_group!(benches, bench_lock_cycles);
criterion_main!(benches);
