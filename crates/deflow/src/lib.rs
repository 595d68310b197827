//! Deterministic decider for history-driven workflow services.
//!
//! Deflow turns the full event history of a workflow run into the next batch
//! of decisions for an SWF-style orchestration service:
//!
//! - **Static item graph**: activities, timers, lambdas and child workflows
//!   with parent dependencies, validated once when the workflow is built
//! - **Replay**: every cycle re-derives the state of each item from the
//!   immutable history; nothing is cached between cycles
//! - **Composable actions**: every event has a default response, which item
//!   handlers can replace with any [`WorkflowAction`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Workflow::decide(history)                         │
//! │                                                                         │
//! │   1. Index history → per-item event streams (WorkflowHistoryEvents)     │
//! │   2. For each new event: interpret → WorkflowAction                     │
//! │   3. Resolve actions → decisions (Continue / Trigger join the graph)    │
//! │   4. Compact: de-duplicate, drop proposals, keep one closing decision   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use deflow::{HistoryEvent, Workflow, WorkflowExecution, WorkflowHistoryEvents, WorkflowDecision};
//! use deflow::history::{EventAttributes, WorkflowExecutionStarted};
//! use time::OffsetDateTime;
//!
//! let workflow = Workflow::builder()
//!     .activity("Download", "1.0", |a| a)
//!     .activity("Transcode", "1.0", |a| a.after_activity("Download", "1.0"))
//!     .build()?;
//!
//! let started = HistoryEvent::new(
//!     1,
//!     OffsetDateTime::UNIX_EPOCH,
//!     EventAttributes::WorkflowExecutionStarted(WorkflowExecutionStarted::default()),
//! );
//! let history = WorkflowHistoryEvents::new(WorkflowExecution::new("wf-1", "run-1"), vec![started])?;
//!
//! let decisions = workflow.decide(&history)?;
//! assert_eq!(decisions.len(), 1);
//! assert!(matches!(&decisions[0], WorkflowDecision::ScheduleActivity(d) if d.identity.name() == "Download"));
//! # Ok::<(), deflow::Error>(())
//! ```
//!
//! # Design Documentation
//!
//! See `DESIGN.md` for architectural decisions.

pub mod action;
mod config;
mod context;
mod decider;
pub mod decision;
mod error;
pub mod event;
pub mod history;
mod identity;
pub mod item;
pub mod visualization;
mod workflow;

pub use action::{Backoff, Limit, RestartAction, ScheduleItemAction, WorkflowAction};
pub use config::DeciderConfig;
pub use context::DecisionContext;
pub use decision::{WireDecision, WorkflowDecision};
pub use error::{Error, Result};
pub use event::{EventType, WorkflowItemEvent};
pub use history::{HistoryEvent, WorkflowExecution, WorkflowHistoryEvents};
pub use identity::{Identity, ItemKind, ScheduleData, ScheduleId, TimerKind};
pub use item::{ItemBuilder, ItemRef};
pub use visualization::{GraphDefinition, ItemStatus};
pub use workflow::{Workflow, WorkflowBuilder, WorkflowHandler};
