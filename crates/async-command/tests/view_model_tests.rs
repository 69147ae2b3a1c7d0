/*
[INPUT]:  View models composed from the shared factory and busy helpers
[OUTPUT]: Verification of busy discipline across commands and ad hoc tasks
[POS]:    Integration tests - view model orchestration
[UPDATE]: When busy accounting or command wiring on view models changes
*/

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_command::{
    AsyncCommand, BusyOutcome, CancellationToken, CommandEvent, CommandFactory, ExecutionOutcome,
    OperationContext, PropertyChange, ViewModel,
};
use common::{harness, wait_until};
use tokio_test::assert_ok;

/// Screen exposing a delay command gated by a user-controlled flag.
struct DelayViewModel {
    view: ViewModel,
    enabled: Arc<AtomicBool>,
    observed_busy: Arc<AtomicBool>,
    delay_command: AsyncCommand<u64>,
}

impl DelayViewModel {
    fn new(factory: CommandFactory) -> Self {
        let view = ViewModel::new(factory.clone());
        let enabled = Arc::new(AtomicBool::new(false));
        let observed_busy = Arc::new(AtomicBool::new(false));

        let op_view = view.clone();
        let op_observed = observed_busy.clone();
        let gate = enabled.clone();
        let delay_command = factory
            .command_with("Delay", move |delay_ms: u64, _ctx: OperationContext| {
                let view = op_view.clone();
                let observed = op_observed.clone();
                async move {
                    let inner_view = view.clone();
                    view.perform_busy_task(
                        async move {
                            observed.store(inner_view.is_busy(), Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                            Ok(())
                        },
                        None,
                        "Waiting",
                    )
                    .await;
                    Ok(())
                }
            })
            .can_execute(move |_delay: &u64| gate.load(Ordering::SeqCst))
            .build()
            .expect("factory builders carry both collaborators");

        Self {
            view,
            enabled,
            observed_busy,
            delay_command,
        }
    }

    fn set_enabled(&self, enabled: bool) {
        if self.enabled.swap(enabled, Ordering::SeqCst) != enabled {
            self.delay_command.raise_can_execute_changed();
        }
    }
}

#[tokio::test]
async fn test_command_runs_busy_task_once_enabled() {
    let h = harness();
    let vm = DelayViewModel::new(h.factory.clone());

    assert!(!vm.view.is_busy());
    assert!(!vm.delay_command.can_execute_with(&50));

    vm.set_enabled(true);
    assert!(vm.delay_command.can_execute_with(&50));

    assert_ok!(vm.delay_command.execute_with(50));
    wait_until(Duration::from_secs(5), || vm.view.is_busy()).await;
    assert_eq!(vm.view.loading_text(), "Waiting");

    wait_until(Duration::from_secs(5), || {
        !vm.delay_command.is_busy() && !vm.view.is_busy()
    })
    .await;
    assert!(vm.observed_busy.load(Ordering::SeqCst));
    assert_eq!(vm.view.loading_text(), "");
    assert_eq!(h.errors.count(), 0);
}

#[tokio::test]
async fn test_toggling_flag_raises_can_execute_changed() {
    let h = harness();
    let vm = DelayViewModel::new(h.factory.clone());
    let raised = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let raised_clone = raised.clone();
    vm.delay_command.subscribe(move |event: &CommandEvent| {
        if *event == CommandEvent::CanExecuteChanged {
            raised_clone.fetch_add(1, Ordering::SeqCst);
        }
    });

    vm.set_enabled(true);
    vm.set_enabled(true);
    vm.set_enabled(false);
    assert_eq!(raised.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_busy_notifications_and_title() {
    let h = harness();
    let view = ViewModel::new(h.factory.clone());
    let events = Arc::new(std::sync::Mutex::new(Vec::new()));
    let events_clone = events.clone();
    view.subscribe(move |event: &CommandEvent| {
        events_clone.lock().unwrap().push(event.clone());
    });

    view.set_title("Tests");
    view.set_title("Tests");
    let outcome = view.perform_busy_task(async { Ok(()) }, None, "Loading").await;

    assert_eq!(outcome, BusyOutcome::Completed);
    assert_eq!(view.title(), "Tests");
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            CommandEvent::PropertyChanged(PropertyChange::Title("Tests".to_string())),
            CommandEvent::PropertyChanged(PropertyChange::LoadingText("Loading".to_string())),
            CommandEvent::PropertyChanged(PropertyChange::IsBusy(true)),
            CommandEvent::PropertyChanged(PropertyChange::IsBusy(false)),
            CommandEvent::PropertyChanged(PropertyChange::LoadingText(String::new())),
        ]
    );
}

#[tokio::test]
async fn test_external_token_cancels_wait() {
    let h = harness();
    let view = ViewModel::new(h.factory.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = view
        .perform_busy_task(std::future::pending(), Some(cancel), "Never")
        .await;

    assert_eq!(outcome, BusyOutcome::Cancelled);
    assert!(!view.is_busy());
    assert_eq!(h.errors.count(), 0);
}

#[tokio::test]
async fn test_perform_busy_operation_disposes_command() {
    let h = harness();
    let view = ViewModel::new(h.factory.clone());
    let probe = view.clone();

    let outcome = view
        .perform_busy_operation(
            move |ctx: OperationContext| {
                let probe = probe.clone();
                async move {
                    anyhow::ensure!(probe.is_busy(), "view model should be busy");
                    ctx.report_progress(100);
                    Ok(())
                }
            },
            "Saving",
        )
        .await;

    assert_eq!(assert_ok!(outcome), ExecutionOutcome::Completed);
    assert!(!view.is_busy());
    assert_eq!(h.errors.count(), 0);
}

#[tokio::test]
async fn test_perform_busy_command_reports_failure_through_handler() {
    let h = harness();
    let view = ViewModel::new(h.factory.clone());
    let command = h.factory.create("Upload", |_ctx: OperationContext| async move {
        anyhow::bail!("upload rejected")
    });

    let outcome = assert_ok!(view.perform_busy_command(&command, "Uploading").await);
    assert_eq!(outcome, ExecutionOutcome::Failed);
    assert_eq!(h.errors.messages(), vec!["upload rejected".to_string()]);
    assert!(!view.is_busy());
    assert!(!command.is_busy());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_busy_tasks_end_on_idle() {
    let h = harness();
    let view = ViewModel::new(h.factory.clone());
    let busy = Arc::new(std::sync::Mutex::new(Vec::new()));
    let busy_clone = busy.clone();
    view.subscribe(move |event: &CommandEvent| {
        if let CommandEvent::PropertyChanged(PropertyChange::IsBusy(value)) = event {
            busy_clone.lock().unwrap().push(*value);
        }
    });

    let mut handles = Vec::new();
    for _ in 0..8 {
        let view = view.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..25 {
                view.perform_busy_task(async { Ok(()) }, None, "Working").await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let busy = busy.lock().unwrap();
    assert!(busy.chunks(2).all(|pair| pair == [true, false]));
    assert!(!view.is_busy());
    assert_eq!(view.loading_text(), "");
}
