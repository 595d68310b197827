//! Workflow definitions shared by the replay scenarios.

use deflow::Workflow;

/// Media pipeline with a join:
///
/// ```text
///              ┌─> Transcode (activity) ─┐
/// Download ────┤                         ├─> Publish
///              └─> Thumbnail (lambda) ───┘
/// ```
pub fn media_pipeline() -> Workflow {
    Workflow::builder()
        .activity("Download", "1.0", |a| a)
        .activity("Transcode", "1.0", |a| a.after_activity("Download", "1.0"))
        .lambda("Thumbnail", |l| l.after_activity("Download", "1.0"))
        .activity("Publish", "1.0", |a| {
            a.after_activity("Transcode", "1.0").after_lambda("Thumbnail")
        })
        .build()
        .unwrap()
}

/// A lambda followed by a timer firing immediately.
pub fn lambda_then_timer() -> Workflow {
    Workflow::builder()
        .lambda("Probe", |l| l)
        .timer("Settle", |t| t.after_lambda("Probe"))
        .build()
        .unwrap()
}

/// Three activities in a row.
pub fn chain() -> Workflow {
    chain_with(|a| a)
}

/// Three activities in a row, the first one configured by `first`.
pub fn chain_with<F>(first: F) -> Workflow
where
    F: FnOnce(deflow::ItemBuilder<deflow::item::ActivitySpec>) -> deflow::ItemBuilder<deflow::item::ActivitySpec>,
{
    Workflow::builder()
        .activity("Fetch", "1.0", first)
        .activity("Parse", "1.0", |a| a.after_activity("Fetch", "1.0"))
        .activity("Store", "1.0", |a| a.after_activity("Parse", "1.0"))
        .build()
        .unwrap()
}
