mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use common::{fake_toolchain, StubProvider};
use crucible::provider::GenerationProvider;
use crucible::{ExecutionStatus, System, SystemConfig};

fn test_config(compiler: &str) -> SystemConfig {
    let mut config = SystemConfig::default();
    config.executor.compiler = compiler.to_string();
    config.executor.source_extension = "sh".to_string();
    config.executor.run_timeout = Duration::from_secs(5);
    config
}

async fn test_system(compiler: &str) -> System {
    let provider: Arc<dyn GenerationProvider> = Arc::new(StubProvider::default());
    System::with_provider(&test_config(compiler), provider).await
}

#[tokio::test]
async fn test_spawned_execution_reports_through_events() {
    let (_toolchain, compiler) = fake_toolchain();
    let system = test_system(&compiler).await;

    let execution_id = system.spawn_execution("#!/bin/sh\necho spawned\n", "");
    let mut subscription = system.subscribe(&execution_id);

    let mut terminal = None;
    while let Some(event) = subscription.recv().await {
        if event.status.is_terminal() {
            terminal = Some(event);
            break;
        }
    }
    let terminal = terminal.expect("spawned execution must terminate");
    assert_eq!(terminal.status, ExecutionStatus::Completed);
    assert_eq!(terminal.result.unwrap().output, "spawned\n");

    let record = system.execution_result(&execution_id).unwrap();
    assert_eq!(record.output, "spawned\n");
}

#[tokio::test]
async fn test_subscribe_after_completion_replays_once() {
    let (_toolchain, compiler) = fake_toolchain();
    let system = test_system(&compiler).await;

    let (execution_id, record) = system.execute("#!/bin/sh\necho done\n", "").await;
    assert_eq!(record.status, ExecutionStatus::Completed);

    // no subscriber existed during the run; joining now yields exactly one
    // completed event carrying the record
    let mut subscription = system.subscribe(&execution_id);
    let event = subscription.recv().await.unwrap();
    assert_eq!(event.status, ExecutionStatus::Completed);
    assert_eq!(event.result.unwrap(), record);

    let extra = tokio::time::timeout(Duration::from_millis(100), subscription.recv()).await;
    assert!(extra.is_err(), "replay must deliver a single event");
}

#[tokio::test]
async fn test_unsubscribe_keeps_record_available() {
    let (_toolchain, compiler) = fake_toolchain();
    let system = test_system(&compiler).await;

    let (execution_id, _) = system.execute("#!/bin/sh\necho hi\n", "").await;
    let subscription = system.subscribe(&execution_id);
    let bus = system.event_bus();
    assert_eq!(bus.subscriber_count(&execution_id), 1);

    system.unsubscribe(&execution_id, subscription.id);
    assert_eq!(bus.subscriber_count(&execution_id), 0);
    assert!(system.execution_result(&execution_id).is_some());
}

#[tokio::test]
async fn test_concurrent_spawns_produce_independent_records() {
    let (_toolchain, compiler) = fake_toolchain();
    let system = test_system(&compiler).await;

    let code = "#!/bin/sh\npwd\n";
    let first = system.spawn_execution(code, "");
    let second = system.spawn_execution(code, "");
    assert_ne!(first, second);

    let mut first_sub = system.subscribe(&first);
    let mut second_sub = system.subscribe(&second);
    let mut outputs = Vec::new();
    for subscription in [&mut first_sub, &mut second_sub] {
        loop {
            let event = subscription.recv().await.expect("events until terminal");
            if event.status.is_terminal() {
                outputs.push(event.result.unwrap().output);
                break;
            }
        }
    }
    assert_ne!(outputs[0], outputs[1], "workspaces must not be shared");
}

#[tokio::test]
async fn test_degraded_system_still_answers_chat() {
    let system = test_system("crucible-no-such-compiler").await;
    assert!(!system.toolchain_available());

    let response = system
        .chat("```c\n#!/bin/sh\necho hi\n```", "", "s1")
        .await;

    assert_eq!(response.kind, crucible::ResponseKind::CodeExecution);
    assert_eq!(response.status, Some(crucible::RunStatus::Error));
    assert!(response.content.contains("not available"));
}

#[tokio::test]
async fn test_generate_does_not_touch_sessions() {
    let (_toolchain, compiler) = fake_toolchain();
    let system = test_system(&compiler).await;

    let code = system.generate("print hello", "c").await.unwrap();
    assert_eq!(code, "int main(){return 0;}");
    assert!(system.sessions().is_empty());
}
