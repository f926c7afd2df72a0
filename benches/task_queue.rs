//! Task queue throughput benchmarks.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use hivemind::{SwarmTask, TaskQueue, WorkerResult};

fn make_tasks(n: usize) -> Vec<SwarmTask> {
    (0..n)
        .map(|i| {
            let mut task = SwarmTask::new(format!("t{i}"), "benchmark work", (i % 9 + 1) as i32);
            // Sparse dependency chains keep readiness checks honest.
            if i % 10 == 9 {
                task = task.with_dependency(format!("t{}", i - 1));
            }
            task
        })
        .collect()
}

fn bench_add_tasks(c: &mut Criterion) {
    c.bench_function("queue_add_1000", |b| {
        b.iter_batched(
            || make_tasks(1000),
            |tasks| {
                let mut queue = TaskQueue::new();
                queue.add_tasks(tasks).unwrap();
                queue
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_drain(c: &mut Criterion) {
    c.bench_function("queue_drain_1000", |b| {
        b.iter_batched(
            || {
                let mut queue = TaskQueue::new();
                queue.add_tasks(make_tasks(1000)).unwrap();
                queue
            },
            |mut queue| {
                while let Some(task) = queue.get_next_task() {
                    queue
                        .complete_task(
                            &task.id,
                            "bench-worker",
                            WorkerResult::success("ok", Duration::ZERO),
                        )
                        .unwrap();
                }
                queue
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_add_tasks, bench_drain);
criterion_main!(benches);
