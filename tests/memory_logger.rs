//! Capture through the per-category logger facade.

use std::sync::Arc;

use serde_json::json;
use tracing_memory_sink::logger::MemoryLoggerProvider;
use tracing_memory_sink::{
    log_values, EventId, Exception, LogLevel, LogSink, LogState, MemorySink, PropertyList,
    ORIGINAL_FORMAT_KEY,
};

#[derive(Debug, thiserror::Error)]
#[error("bla")]
struct InvalidOperation;

fn setup() -> (MemoryLoggerProvider, Arc<dyn LogSink>) {
    let provider = MemoryLoggerProvider::new(Arc::new(MemorySink::new()));
    let sink = provider.log_sink();
    (provider, sink)
}

fn prop(key: &str, value: serde_json::Value) -> (String, serde_json::Value) {
    (key.to_string(), value)
}

#[test]
fn clear_empties_buffer() {
    let (provider, sink) = setup();

    let logger = provider.create_logger("Category1");
    logger.information(log_values!("{Arg1}, {Arg2}", 15, "SomeText"));
    let another = provider.create_logger("Category2");
    another.error(Some(Exception::new(InvalidOperation)), log_values!("{ArgOne}", 23));
    assert_eq!(sink.logs().len(), 2);

    sink.clear();
    assert!(sink.logs().is_empty());

    logger.information(log_values!("after clear"));
    let logs = sink.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message, "after clear");
}

#[test]
fn multiple_logs_are_captured_in_order() {
    let (provider, sink) = setup();

    let logger = provider.create_logger("Category1");
    logger.information(log_values!("{Arg1}, {Arg2}", 15, "SomeText"));
    let another = provider.create_logger("Category2");
    let error = Exception::new(InvalidOperation);
    another.error(Some(error.clone()), log_values!("{ArgOne}", 23));

    let logs = sink.logs();
    assert_eq!(logs.len(), 2);

    let log = &logs[0];
    assert_eq!(log.event_id.id, 0);
    assert_eq!(log.message, "15, SomeText");
    assert_eq!(log.state.message(), "15, SomeText");
    assert_eq!(log.category, "Category1");
    assert_eq!(log.level, LogLevel::Information);
    assert!(log.exception.is_none());
    assert_eq!(
        log.state.properties(),
        &[
            prop("Arg1", json!(15)),
            prop("Arg2", json!("SomeText")),
            prop(ORIGINAL_FORMAT_KEY, json!("{Arg1}, {Arg2}")),
        ][..]
    );
    assert_eq!(log.state.original_format(), "{Arg1}, {Arg2}");
    assert!(log.scopes.is_empty());

    let log = &logs[1];
    assert_eq!(log.event_id.id, 0);
    assert_eq!(log.message, "23");
    assert_eq!(log.state.message(), "23");
    assert_eq!(log.category, "Category2");
    assert_eq!(log.level, LogLevel::Error);
    let exception = log.exception.as_ref().expect("exception captured");
    assert!(exception.is::<InvalidOperation>());
    assert_eq!(exception, &error);
    assert_eq!(
        log.state.properties(),
        &[prop("ArgOne", json!(23)), prop(ORIGINAL_FORMAT_KEY, json!("{ArgOne}"))][..]
    );
    assert_eq!(log.state.original_format(), "{ArgOne}");
    assert!(log.scopes.is_empty());
}

#[test]
fn single_template_scope() {
    let (provider, sink) = setup();

    let logger = provider.create_logger("Category1");
    {
        let _scope = logger.begin_scope(log_values!("Scope Arg: {ScopeArg}", "ScopeValue"));
        logger.information(log_values!("{Arg1}, {Arg2}", 15, "SomeText"));
    }

    let logs = sink.logs();
    assert_eq!(logs.len(), 1);
    let log = &logs[0];
    assert_eq!(log.message, "15, SomeText");
    assert_eq!(log.scopes.len(), 1);

    let scope = &log.scopes[0];
    assert_eq!(scope.message(), "Scope Arg: ScopeValue");
    assert_eq!(
        scope.properties(),
        &[
            prop("ScopeArg", json!("ScopeValue")),
            prop(ORIGINAL_FORMAT_KEY, json!("Scope Arg: {ScopeArg}")),
        ][..]
    );
    assert_eq!(scope.original_format(), "Scope Arg: {ScopeArg}");
}

#[test]
fn nested_template_scopes_outermost_first() {
    let (provider, sink) = setup();

    let logger = provider.create_logger("Category1");
    {
        let _scope1 = logger.begin_scope(log_values!("Scope1 Arg: {Scope1Arg}", "Scope1Value"));
        let _scope2 = logger.begin_scope(log_values!("Scope2 Arg: {Scope2Arg}", "Scope2Value"));
        logger.information(log_values!("{Arg1}, {Arg2}", 15, "SomeText"));
    }

    let logs = sink.logs();
    let scopes = &logs[0].scopes;
    assert_eq!(scopes.len(), 2);
    assert_eq!(scopes[0].message(), "Scope1 Arg: Scope1Value");
    assert_eq!(scopes[0].properties().len(), 2);
    assert_eq!(scopes[1].message(), "Scope2 Arg: Scope2Value");
    assert_eq!(scopes[1].properties().len(), 2);
}

#[test]
fn scopes_are_shared_between_loggers() {
    let (provider, sink) = setup();

    let logger1 = provider.create_logger("Category1");
    let logger2 = provider.create_logger("Category2");
    {
        let _scope = logger1.begin_scope(log_values!("Scope Arg: {ScopeArg}", "ScopeValue"));
        logger2.information(log_values!("{Arg1}, {Arg2}", 15, "SomeText"));
    }

    let logs = sink.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message, "15, SomeText");
    assert_eq!(logs[0].scopes.len(), 1);
    assert_eq!(logs[0].scopes[0].message(), "Scope Arg: ScopeValue");
}

#[test]
fn scopes_are_not_shared_between_providers() {
    let (first, sink) = setup();
    let second = MemoryLoggerProvider::new(first.sink());

    let scoped = first.create_logger("Category1");
    let other = second.create_logger("Category1");
    {
        let _scope = scoped.begin_scope("first provider only".to_string());
        other.information(log_values!("from second"));
    }

    let logs = sink.logs();
    assert!(logs[0].scopes.is_empty());
}

#[test]
fn object_scope_uses_its_own_rendering() {
    let (provider, sink) = setup();

    let logger = provider.create_logger("Category1");
    let props = PropertyList::new().with("Prop1", "value1").with("Prop2", 16);
    {
        let _scope = logger.begin_scope(props);
        logger.information(log_values!("{Arg1}, {Arg2}", 15, "SomeText"));
    }

    let logs = sink.logs();
    let scope = &logs[0].scopes[0];
    assert_eq!(scope.message(), "Prop1: value1, Prop2: 16");
    assert_eq!(
        scope.properties(),
        &[prop("Prop1", json!("value1")), prop("Prop2", json!(16))][..]
    );
    assert_eq!(scope.original_format(), "");
}

#[test]
fn written_entry_equals_expected_entry() {
    let (provider, sink) = setup();
    let logger = provider.create_logger("Orders");
    logger.log_values(
        LogLevel::Warning,
        EventId::with_name(12, "Delayed"),
        None,
        log_values!("Order {OrderId} delayed", 7),
    );

    let logs = sink.logs();
    let expected = tracing_memory_sink::LogEntry::new(
        chrono::Local::now().fixed_offset(),
        "Orders",
        LogLevel::Warning,
        EventId::new(12),
        None,
        "Order 7 delayed",
        LogState::new(
            "Order 7 delayed",
            vec![
                prop("OrderId", json!(7)),
                prop(ORIGINAL_FORMAT_KEY, json!("Order {OrderId} delayed")),
            ],
        ),
        Vec::new(),
    );
    assert_eq!(*logs[0], expected);
}

struct LogOnDrop(Arc<tracing_memory_sink::logger::MemoryLogger>);

impl Drop for LogOnDrop {
    fn drop(&mut self) {
        let _scope = self.0.begin_scope("teardown".to_string());
        self.0.information(log_values!("thread exiting"));
    }
}

thread_local! {
    static LOG_ON_EXIT: std::cell::RefCell<Option<LogOnDrop>> = const { std::cell::RefCell::new(None) };
}

#[test]
fn logging_from_thread_local_destructor() {
    let (provider, sink) = setup();
    let logger = provider.create_logger("Teardown");

    std::thread::spawn(move || {
        // Thread-locals are destroyed in reverse order of first use: the
        // scope stack goes first, then the holder, then the clock's cache.
        let _ = chrono::Local::now();
        LOG_ON_EXIT.with(|slot| *slot.borrow_mut() = Some(LogOnDrop(Arc::clone(&logger))));
        logger.information(log_values!("running"));
    })
    .join()
    .expect("thread exits cleanly");

    let logs = sink.logs();
    let messages: Vec<&str> = logs.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["running", "thread exiting"]);
    assert!(logs[1].scopes.is_empty());
}
