use std::time::Instant;
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;

use tracing_stackdriver_fmt::init::layer;
use tracing_stackdriver_fmt::Formatter;

fn main() {
    let formatter = Formatter::new()
        .with_service("default-load")
        .with_version(env!("CARGO_PKG_VERSION"));

    // Discard the output; this measures formatting plus stack attribution.
    let fmt_layer = layer(formatter).with_writer(std::io::sink);
    let subscriber = tracing_subscriber::registry().with(fmt_layer);
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install subscriber: {}", e);
        return;
    }

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: formatted {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
}
