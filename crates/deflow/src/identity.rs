//! Item identities, schedule ids and the control blob attached to scheduling calls.
//!
//! An [`Identity`] names a schedulable item at configuration time. The remote
//! service only knows opaque ids, so every identity derives a [`ScheduleId`]
//! that is written into the activity/timer/lambda/child-workflow id field and
//! used to correlate history events back to their item.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};

/// The kind of a schedulable workflow item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    Activity,
    Timer,
    ChildWorkflow,
    Lambda,
}

impl ItemKind {
    fn tag(self) -> &'static str {
        match self {
            ItemKind::Activity => "activity",
            ItemKind::Timer => "timer",
            ItemKind::ChildWorkflow => "child-workflow",
            ItemKind::Lambda => "lambda",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Canonical identity of a workflow item.
///
/// Equality is structural. The positional name disambiguates several
/// schedulings of the same logical activity, lambda or child workflow in one
/// workflow; it is empty for the common single-use case.
///
/// # Example
///
/// ```
/// use deflow::Identity;
///
/// let first = Identity::activity("Download", "1.0", "first").unwrap();
/// let second = Identity::activity("Download", "1.0", "second").unwrap();
/// assert_ne!(first, second);
/// assert!(Identity::activity("", "1.0", "").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    kind: ItemKind,
    name: String,
    version: Option<String>,
    positional_name: String,
}

impl Identity {
    /// Identity of an activity.
    pub fn activity(
        name: impl Into<String>,
        version: impl Into<String>,
        positional_name: impl Into<String>,
    ) -> Result<Self> {
        Self::versioned(ItemKind::Activity, name.into(), version.into(), positional_name.into())
    }

    /// Identity of a child workflow.
    pub fn child_workflow(
        name: impl Into<String>,
        version: impl Into<String>,
        positional_name: impl Into<String>,
    ) -> Result<Self> {
        Self::versioned(
            ItemKind::ChildWorkflow,
            name.into(),
            version.into(),
            positional_name.into(),
        )
    }

    /// Identity of a timer. Timers are identified by name alone.
    pub fn timer(name: impl Into<String>) -> Result<Self> {
        let name = required("name", name.into())?;
        Ok(Self {
            kind: ItemKind::Timer,
            name,
            version: None,
            positional_name: String::new(),
        })
    }

    /// Identity of a lambda function.
    pub fn lambda(name: impl Into<String>, positional_name: impl Into<String>) -> Result<Self> {
        let name = required("name", name.into())?;
        Ok(Self {
            kind: ItemKind::Lambda,
            name,
            version: None,
            positional_name: positional_name.into(),
        })
    }

    fn versioned(
        kind: ItemKind,
        name: String,
        version: String,
        positional_name: String,
    ) -> Result<Self> {
        let name = required("name", name)?;
        let version = required("version", version)?;
        Ok(Self {
            kind,
            name,
            version: Some(version),
            positional_name,
        })
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version for activities and child workflows, `None` for timers and lambdas.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn positional_name(&self) -> &str {
        &self.positional_name
    }

    /// Derive the wire-level id for this item.
    ///
    /// The run id only contributes for child workflows, whose ids must not
    /// collide across restarted runs of the owning workflow.
    pub fn schedule_id(&self, run_id: &str) -> ScheduleId {
        let mut hasher = Sha256::new();
        for part in [
            self.kind.tag(),
            self.name.as_str(),
            self.version.as_deref().unwrap_or_default(),
            self.positional_name.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        if self.kind == ItemKind::ChildWorkflow {
            hasher.update(run_id.as_bytes());
        }
        let digest = hasher.finalize();
        ScheduleId(hex::encode(&digest[..16]))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)?;
        if let Some(version) = &self.version {
            write!(f, " v{version}")?;
        }
        if !self.positional_name.is_empty() {
            write!(f, " [{}]", self.positional_name)?;
        }
        Ok(())
    }
}

fn required(argument: &'static str, value: String) -> Result<String> {
    if value.trim().is_empty() {
        return Err(Error::invalid_argument(argument, "must not be empty"));
    }
    Ok(value)
}

/// Opaque id written into the remote service's item id fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(String);

impl ScheduleId {
    /// Wrap an id read back from history.
    pub fn raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<String> for ScheduleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ScheduleId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Why a timer was started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    /// A timer item configured in the workflow.
    #[default]
    WorkflowItem,
    /// The implicit timer delaying the re-scheduling of an item.
    Reschedule,
    /// A timeout while waiting for a signal. Not correlated to items.
    SignalTimer,
}

/// Control blob round-tripped through the remote service.
///
/// Serialized as compact JSON into the `control` field of scheduling
/// decisions. Unknown fields are ignored and missing ones default, so a blob
/// written by another version of the code still reads back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleData {
    #[serde(rename = "pn", default)]
    pub positional_name: String,
    #[serde(rename = "tk", default)]
    pub timer_kind: TimerKind,
    #[serde(rename = "nm", default, skip_serializing_if = "Option::is_none")]
    pub timer_name: Option<String>,
}

impl ScheduleData {
    /// Control data for scheduling an activity, lambda or child workflow.
    pub fn for_item(identity: &Identity) -> Self {
        Self {
            positional_name: identity.positional_name().to_owned(),
            ..Self::default()
        }
    }

    /// Control data for starting a timer on behalf of `identity`.
    pub fn for_timer(identity: &Identity, timer_kind: TimerKind) -> Self {
        Self {
            positional_name: identity.positional_name().to_owned(),
            timer_kind,
            timer_name: Some(identity.name().to_owned()),
        }
    }

    /// Serialize into the control string.
    pub fn to_control(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Read a control string back. Missing or unreadable blobs yield the default.
    pub fn from_control(control: Option<&str>) -> Self {
        let Some(control) = control.filter(|c| !c.trim().is_empty()) else {
            return Self::default();
        };
        match serde_json::from_str(control) {
            Ok(data) => data,
            Err(err) => {
                debug!(error = %err, "ignoring unreadable control blob");
                Self::default()
            }
        }
    }
}
