//! Integration tests for the dispatch loop, driving it with scripted
//! collaborators and real child processes.

#![cfg(unix)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use voice_dispatch::audit::EventLog;
use voice_dispatch::config::WorkerSpec;
use voice_dispatch::dispatch::{DispatchLoop, LoopState};
use voice_dispatch::interrupt::{InterruptListener, InterruptTrigger, ShutdownSignal};
use voice_dispatch::supervisor::ProcessSupervisor;
use voice_dispatch::voice::{CommandSource, Feedback, VoiceError};

/// Yields a fixed sequence of transcripts, then blocks forever.
struct ScriptedSource {
    items: VecDeque<Option<String>>,
}

impl ScriptedSource {
    fn new(items: impl IntoIterator<Item = Option<&'static str>>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|item| item.map(str::to_string))
                .collect(),
        }
    }
}

#[async_trait]
impl CommandSource for ScriptedSource {
    async fn listen(&mut self) -> Option<String> {
        match self.items.pop_front() {
            Some(item) => item,
            None => std::future::pending().await,
        }
    }
}

/// Records every notification for later assertions.
#[derive(Clone, Default)]
struct RecordingFeedback {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingFeedback {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Feedback for RecordingFeedback {
    async fn notify(&self, message: &str) -> Result<(), VoiceError> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Feedback that always fails, for the swallow-errors contract.
struct FailingFeedback;

#[async_trait]
impl Feedback for FailingFeedback {
    async fn notify(&self, _message: &str) -> Result<(), VoiceError> {
        Err(VoiceError::Tts("synthesizer offline".to_string()))
    }
}

/// Test trigger fired manually through a Notify.
struct ManualTrigger {
    notify: Arc<tokio::sync::Notify>,
}

#[async_trait]
impl InterruptTrigger for ManualTrigger {
    async fn triggered(&mut self) {
        self.notify.notified().await;
    }
}

fn script_spec(dir: &Path, name: &str, body: &str) -> WorkerSpec {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    WorkerSpec::new(name, name)
}

struct Fixture {
    supervisor: Arc<ProcessSupervisor>,
    shutdown: ShutdownSignal,
    events: EventLog,
    reading: WorkerSpec,
    detection: WorkerSpec,
}

async fn fixture(dir: &Path, reading: WorkerSpec, detection: WorkerSpec) -> Fixture {
    let events = EventLog::open_in_memory().await.unwrap();
    let shutdown = ShutdownSignal::new();
    let supervisor = Arc::new(ProcessSupervisor::new(
        dir.to_path_buf(),
        shutdown.clone(),
        events.clone(),
    ));
    Fixture {
        supervisor,
        shutdown,
        events,
        reading,
        detection,
    }
}

#[tokio::test]
async fn quit_command_stops_the_loop_with_a_farewell() {
    let dir = tempfile::tempdir().unwrap();
    let fx = fixture(
        dir.path(),
        WorkerSpec::new("reading", "reading/read"),
        WorkerSpec::new("detection", "yolo/detect"),
    )
    .await;
    let feedback = RecordingFeedback::default();

    let mut dispatcher = DispatchLoop::new(
        ScriptedSource::new([Some("quit please")]),
        feedback.clone(),
        fx.supervisor,
        fx.shutdown.clone(),
        fx.events,
        fx.reading,
        fx.detection,
    );
    dispatcher.run().await;

    assert_eq!(dispatcher.state(), LoopState::Stopped);
    // The exit path raises the shutdown signal, so a late emergency trigger
    // hits the once-only guard instead of a second stop sequence.
    assert!(fx.shutdown.is_raised());
    let messages = feedback.messages();
    assert_eq!(messages.last().map(String::as_str), Some("Goodbye."));
}

#[tokio::test]
async fn read_command_launches_the_reading_module() {
    let dir = tempfile::tempdir().unwrap();
    let reading = script_spec(dir.path(), "reading", "exit 0");
    let fx = fixture(dir.path(), reading, WorkerSpec::new("detection", "missing")).await;
    let feedback = RecordingFeedback::default();

    let mut dispatcher = DispatchLoop::new(
        ScriptedSource::new([Some("please read this"), Some("exit")]),
        feedback.clone(),
        Arc::clone(&fx.supervisor),
        fx.shutdown,
        fx.events.clone(),
        fx.reading,
        fx.detection,
    );
    dispatcher.run().await;

    assert!(feedback
        .messages()
        .iter()
        .any(|m| m == "Opening reading module."));
    assert_eq!(fx.supervisor.active_count().await, 0);

    let recorded = fx.events.recent(20).await.unwrap();
    assert!(recorded
        .iter()
        .any(|e| e.service == "MAIN" && e.message == "Launching module"));
}

#[tokio::test]
async fn missing_module_notifies_and_leaves_registry_empty() {
    let dir = tempfile::tempdir().unwrap();
    let fx = fixture(
        dir.path(),
        WorkerSpec::new("reading", "reading/read"),
        WorkerSpec::new("detection", "yolo/detect"),
    )
    .await;
    let feedback = RecordingFeedback::default();

    let mut dispatcher = DispatchLoop::new(
        ScriptedSource::new([Some("read"), Some("exit")]),
        feedback.clone(),
        Arc::clone(&fx.supervisor),
        fx.shutdown,
        fx.events,
        fx.reading,
        fx.detection,
    );
    dispatcher.run().await;

    assert!(feedback
        .messages()
        .iter()
        .any(|m| m == "Module reading not found."));
    assert_eq!(fx.supervisor.active_count().await, 0);
}

#[tokio::test]
async fn second_command_while_busy_is_dropped_with_notification() {
    let dir = tempfile::tempdir().unwrap();
    let reading = script_spec(dir.path(), "read", "sleep 5");
    let fx = fixture(dir.path(), reading, WorkerSpec::new("detection", "missing")).await;
    let feedback = RecordingFeedback::default();

    let mut dispatcher = DispatchLoop::new(
        ScriptedSource::new([Some("read"), Some("read it again"), Some("exit")]),
        feedback.clone(),
        Arc::clone(&fx.supervisor),
        fx.shutdown,
        fx.events,
        fx.reading,
        fx.detection,
    );
    dispatcher.run().await;

    let messages = feedback.messages();
    let busy = messages
        .iter()
        .filter(|m| m.as_str() == "Another module is still running. Please wait.")
        .count();
    assert_eq!(busy, 1);
    // Exit ran stop_all; the sleeping worker is gone.
    assert_eq!(fx.supervisor.active_count().await, 0);
}

#[tokio::test]
async fn unknown_and_empty_transcripts_do_not_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let fx = fixture(
        dir.path(),
        WorkerSpec::new("reading", "reading/read"),
        WorkerSpec::new("detection", "yolo/detect"),
    )
    .await;
    let feedback = RecordingFeedback::default();

    let mut dispatcher = DispatchLoop::new(
        ScriptedSource::new([None, Some("banana"), Some("exit")]),
        feedback.clone(),
        Arc::clone(&fx.supervisor),
        fx.shutdown,
        fx.events,
        fx.reading,
        fx.detection,
    );
    dispatcher.run().await;

    let messages = feedback.messages();
    // Ready, clarification for "banana", farewell. The None iteration is
    // silent.
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().any(|m| m == "I didn't understand that."));
}

#[tokio::test]
async fn feedback_failures_never_abort_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let fx = fixture(
        dir.path(),
        WorkerSpec::new("reading", "reading/read"),
        WorkerSpec::new("detection", "yolo/detect"),
    )
    .await;

    let mut dispatcher = DispatchLoop::new(
        ScriptedSource::new([Some("banana"), Some("read"), Some("quit")]),
        FailingFeedback,
        fx.supervisor,
        fx.shutdown,
        fx.events,
        fx.reading,
        fx.detection,
    );
    dispatcher.run().await;
    assert_eq!(dispatcher.state(), LoopState::Stopped);
}

#[tokio::test]
async fn emergency_trigger_stops_a_running_worker_while_loop_is_blocked() {
    let dir = tempfile::tempdir().unwrap();
    let reading = script_spec(dir.path(), "read", "sleep 10");
    let fx = fixture(dir.path(), reading, WorkerSpec::new("detection", "missing")).await;
    let feedback = RecordingFeedback::default();

    // The loop dispatches the reading worker, then blocks on listen forever.
    let mut dispatcher = DispatchLoop::new(
        ScriptedSource::new([Some("please read this")]),
        feedback,
        Arc::clone(&fx.supervisor),
        fx.shutdown.clone(),
        fx.events,
        fx.reading,
        fx.detection,
    );
    let loop_task = tokio::spawn(async move { dispatcher.run().await });

    tokio::time::timeout(Duration::from_secs(5), async {
        while !fx.supervisor.is_busy().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("worker never started");

    // Fire the emergency trigger; the listener must not depend on the loop
    // making progress.
    let notify = Arc::new(tokio::sync::Notify::new());
    let mut listener = InterruptListener::new(
        ManualTrigger {
            notify: Arc::clone(&notify),
        },
        Arc::clone(&fx.supervisor),
        fx.shutdown.clone(),
    );
    let listener_task = tokio::spawn(async move { listener.run_to_stop().await });
    notify.notify_one();

    tokio::time::timeout(Duration::from_secs(5), listener_task)
        .await
        .expect("emergency stop timed out")
        .unwrap();

    assert!(fx.shutdown.is_raised());
    assert_eq!(fx.supervisor.active_count().await, 0);
    loop_task.abort();
}

#[tokio::test]
async fn repeated_triggers_run_the_stop_sequence_once() {
    let dir = tempfile::tempdir().unwrap();
    let fx = fixture(
        dir.path(),
        WorkerSpec::new("reading", "reading/read"),
        WorkerSpec::new("detection", "yolo/detect"),
    )
    .await;

    let notify = Arc::new(tokio::sync::Notify::new());
    let mut listener = InterruptListener::new(
        ManualTrigger {
            notify: Arc::clone(&notify),
        },
        fx.supervisor,
        fx.shutdown.clone(),
    );

    // First trigger wins the raise; run_to_stop returns after one sequence.
    let task = tokio::spawn(async move { listener.run_to_stop().await });
    notify.notify_one();
    notify.notify_one();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("stop sequence timed out")
        .unwrap();
    assert!(fx.shutdown.is_raised());
}
