use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::info;

use tracing_memory_sink::init::init_tracing;
use tracing_memory_sink::MemorySink;

fn main() {
    let sink = Arc::new(MemorySink::new());
    if let Err(e) = init_tracing(Arc::clone(&sink)) {
        eprintln!("failed to install capture layer: {e}");
        return;
    }

    let threads: u64 = 8;
    let per_thread: u64 = 25_000;
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            thread::spawn(move || {
                let span = tracing::info_span!("worker", id = t);
                let _entered = span.enter();
                for i in 0..per_thread {
                    info!(iteration = i, "concurrent load test event");
                }
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            eprintln!("worker thread panicked");
        }
    }

    let elapsed = start.elapsed();
    let captured = sink.len() as u64;
    println!("concurrent: captured {} of {} events in {:?} (~{:.0} ev/s)",
        captured,
        threads * per_thread,
        elapsed,
        captured as f64 / elapsed.as_secs_f64()
    );

    let start = Instant::now();
    sink.clear();
    println!("clear took {:?}, {} entries left", start.elapsed(), sink.len());
}
