//! A service-local logging wrapper whose frames are skipped, so log lines
//! point at the code calling the wrapper.
//!
//! Configure through the environment, e.g.
//! `STACKDRIVER_SERVICE=orders STACKDRIVER_VERSION=1.2.0 cargo run --example wrapper_skip`.

use std::error::Error;

use tracing_stackdriver_fmt::init::{init_tracing_with_config, install_panic_hook, LayerConfig};
use tracing_stackdriver_fmt::{Formatter, FormatterConfig};

mod applog {
    pub fn failed(action: &str, err: &(dyn std::error::Error + 'static)) {
        tracing::error!(action, error = err, "request failed");
    }

    pub fn served(method: &str, status: u16) {
        let request = serde_json::json!({"requestMethod": method, "status": status});
        tracing::info!(http_request = %request, "request served");
    }
}

fn handle_order() -> Result<(), std::io::Error> {
    Err(std::io::Error::new(std::io::ErrorKind::NotFound, "order 42 not found"))
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut config = FormatterConfig::from_env();
    config.stack_skip.push(format!("{}::applog", module_path!()));
    let formatter = Formatter::from_config(config);

    install_panic_hook(formatter.clone());
    init_tracing_with_config(formatter, LayerConfig::from_env())?;

    applog::served("GET", 200);
    if let Err(e) = handle_order() {
        applog::failed("load_order", &e);
    }
    Ok(())
}
