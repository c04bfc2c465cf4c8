use perfpair_types::{ComparisonDetectionStrategy, ComparisonGroupId, CompletionEvent, TestClassMetadata};
use std::collections::{BTreeMap, BTreeSet};

/// Comparison group of an event: its own tag, else the tag the class declares
/// for its method.
pub fn resolve_group<'a>(
    event: &'a CompletionEvent,
    class: Option<&'a TestClassMetadata>,
) -> Option<&'a ComparisonGroupId> {
    event
        .comparison_group
        .as_ref()
        .or_else(|| class.and_then(|c| c.group_of(&event.method_name)))
}

/// Groups in a batch that are eligible for comparison under `strategy`.
///
/// Failed methods count as executed here; the engine reports their pairs as
/// unavailable.
pub fn detect(
    members: &[CompletionEvent],
    class: Option<&TestClassMetadata>,
    strategy: ComparisonDetectionStrategy,
) -> BTreeSet<ComparisonGroupId> {
    if strategy == ComparisonDetectionStrategy::Never {
        return BTreeSet::new();
    }

    let mut executed: BTreeMap<&ComparisonGroupId, BTreeSet<&str>> = BTreeMap::new();
    for event in members {
        if let Some(group) = resolve_group(event, class) {
            executed
                .entry(group)
                .or_default()
                .insert(event.method_name.as_str());
        }
    }

    executed
        .into_iter()
        .filter(|(group, methods)| {
            let present = methods.len();
            if present < 2 {
                return false;
            }
            match strategy {
                ComparisonDetectionStrategy::Always => true,
                ComparisonDetectionStrategy::ByTestCaseCount => {
                    class.is_some_and(|c| c.declared_in_group(group) == present)
                }
                ComparisonDetectionStrategy::Never => false,
            }
        })
        .map(|(group, _)| group.clone())
        .collect()
}

/// Members of `group`, in ascending method-name order.
pub fn group_members<'a>(
    members: &'a [CompletionEvent],
    class: Option<&'a TestClassMetadata>,
    group: &ComparisonGroupId,
) -> Vec<&'a CompletionEvent> {
    let mut selected: Vec<&CompletionEvent> = members
        .iter()
        .filter(|e| resolve_group(e, class) == Some(group))
        .collect();
    selected.sort_by(|a, b| {
        a.method_name
            .cmp(&b.method_name)
            .then_with(|| a.test_case_id.cmp(&b.test_case_id))
    });
    selected
}
