use std::sync::Arc;

use tracing_memory_sink::logger::MemoryLoggerProvider;
use tracing_memory_sink::{log_values, Exception, MemorySink, PropertyList};

#[derive(Debug, thiserror::Error)]
#[error("payment gateway returned {0}")]
struct GatewayError(u16);

fn main() {
    let sink = Arc::new(MemorySink::new());
    let provider = MemoryLoggerProvider::new(Arc::clone(&sink));

    let orders = provider.create_logger("Shop.Orders");
    let payments = provider.create_logger("Shop.Payments");

    {
        let _request = orders.begin_scope(log_values!("Request {RequestId}", "r-1001"));
        let _user = orders.begin_scope(PropertyList::new().with("UserId", 7).with("Region", "eu"));

        orders.information(log_values!("Order {OrderId} created with {Items} items", 42, 3));
        payments.error(
            Some(Exception::new(GatewayError(502))),
            log_values!("Charging {Amount,8} failed", 19.99),
        );
    }
    orders.warning(log_values!("No scope here"));

    let logs = sink.logs();
    for entry in &logs {
        println!("[{}] {} {}: {}", entry.time_offset, entry.level, entry.category, entry.message);
        for (key, value) in entry.state.properties() {
            println!("    {key} = {value}");
        }
        for scope in &entry.scopes {
            println!("    scope: {}", scope.message());
        }
        if let Some(exception) = &entry.exception {
            println!("    exception: {exception}");
        }
    }

    let entries: Vec<&_> = logs.iter().map(|e| &**e).collect();
    match serde_json::to_string_pretty(&entries) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to serialize entries: {e}"),
    }
}
