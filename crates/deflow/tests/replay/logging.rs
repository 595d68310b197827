//! Structured log output of decision cycles.

use std::sync::{Arc, Mutex};

use deflow::{DeciderConfig, Workflow};
use test_utils::HistoryBuilder;

struct BufferWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl std::io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run one start cycle of `workflow` and return everything it logged.
fn capture_start_cycle(workflow: &Workflow) -> String {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let writer_buffer = Arc::clone(&buffer);
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || BufferWriter {
            buffer: Arc::clone(&writer_buffer),
        })
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let history = HistoryBuilder::new("wf-log", "run-log")
        .started(None)
        .build()
        .unwrap();
    workflow.decide(&history).unwrap();

    let locked = buffer.lock().unwrap();
    String::from_utf8_lossy(&locked).into_owned()
}

fn workflow(config: DeciderConfig) -> Workflow {
    Workflow::builder()
        .activity("Download", "1.0", |a| a)
        .config(config)
        .build()
        .unwrap()
}

#[test]
fn cycle_summary_is_logged() {
    let output = capture_start_cycle(&workflow(DeciderConfig::default()));

    assert!(output.contains("decision cycle complete"), "{output}");
    assert!(output.contains("workflow_id=wf-log"), "{output}");
    assert!(output.contains("decisions=1"), "{output}");
    assert!(output.contains("ScheduleActivityTask"), "{output}");
}

#[test]
fn per_decision_lines_can_be_disabled() {
    let config = DeciderConfig {
        log_decisions: false,
        ..DeciderConfig::default()
    };
    let output = capture_start_cycle(&workflow(config));

    assert!(output.contains("decision cycle complete"), "{output}");
    assert!(!output.contains("ScheduleActivityTask"), "{output}");
}
