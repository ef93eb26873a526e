//! Marker-tagged merge of hook handlers into the shared settings document.
//!
//! The registry maps an event name to an ordered list of handler objects.
//! Handlers written by kitsync carry [`super::ownership::OWNER_MARKER_FIELD`] naming the hook
//! that produced them; everything else in the list belongs to the user and is
//! never touched.

use std::path::Path;

use serde_json::{Map, Value};

use super::document::JsonDocument;
use super::ownership::{is_owned_by, tag_handler};

/// Top-level field of the settings document holding the hook registry.
pub const HOOKS_FIELD: &str = "hooks";

/// Whether any event list holds a handler owned by `owner`.
pub fn contains_hook(registry: &Map<String, Value>, owner: &str) -> bool {
    registry
        .values()
        .filter_map(Value::as_array)
        .flatten()
        .any(|handler| is_owned_by(handler, owner))
}

/// Merge a hook's declared `{event: handler | [handler]}` map into the registry.
///
/// For each declared event the owner's existing handlers are replaced in
/// place, at the position of the first one; with none present the new
/// handlers are appended. Events the hook no longer declares lose the owner's
/// handlers, and emptied events are deleted.
///
/// Handlers that are not objects cannot carry the owner marker and are
/// skipped. An event slot in the registry that is not a list belongs to the
/// user and is left as it is.
///
/// Returns `true` if the owner already had handlers before the merge.
pub fn merge_hook(
    registry: &mut Map<String, Value>,
    owner: &str,
    declared: &Map<String, Value>,
) -> bool {
    let existed = contains_hook(registry, owner);

    for (event, handlers) in declared {
        let items = match handlers {
            Value::Array(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };
        let tagged: Vec<Value> = items
            .iter()
            .filter_map(|handler| match handler.as_object() {
                Some(map) => Some(tag_handler(map, owner)),
                None => {
                    tracing::warn!(event = %event, hook = owner, "skipping non-object hook handler");
                    None
                }
            })
            .collect();

        if tagged.is_empty() {
            remove_owned_from_event(registry, event, owner);
            continue;
        }

        match registry.get_mut(event) {
            Some(Value::Array(list)) => replace_owned(list, owner, tagged),
            Some(_) => {
                tracing::warn!(event = %event, hook = owner, "hook event entry is not a list; leaving it alone");
            }
            None => {
                registry.insert(event.clone(), Value::Array(tagged));
            }
        }
    }

    let stale_events: Vec<String> = registry
        .keys()
        .filter(|event| !declared.contains_key(*event))
        .cloned()
        .collect();
    for event in stale_events {
        remove_owned_from_event(registry, &event, owner);
    }

    existed
}

/// Remove every handler owned by `owner`; delete events left empty.
///
/// Returns `true` if anything was removed.
pub fn remove_hook(registry: &mut Map<String, Value>, owner: &str) -> bool {
    let events: Vec<String> = registry.keys().cloned().collect();
    let mut removed = false;
    for event in events {
        removed |= remove_owned_from_event(registry, &event, owner);
    }
    removed
}

fn replace_owned(list: &mut Vec<Value>, owner: &str, replacement: Vec<Value>) {
    let Some(first) = list.iter().position(|h| is_owned_by(h, owner)) else {
        list.extend(replacement);
        return;
    };

    let mut merged = Vec::with_capacity(list.len() + replacement.len());
    let mut replacement = Some(replacement);
    for (idx, handler) in list.drain(..).enumerate() {
        if idx == first {
            merged.extend(replacement.take().unwrap_or_default());
        } else if !is_owned_by(&handler, owner) {
            merged.push(handler);
        }
    }
    *list = merged;
}

fn remove_owned_from_event(registry: &mut Map<String, Value>, event: &str, owner: &str) -> bool {
    let Some(Value::Array(list)) = registry.get_mut(event) else {
        return false;
    };
    let before = list.len();
    list.retain(|h| !is_owned_by(h, owner));
    let removed = list.len() != before;
    if removed && list.is_empty() {
        registry.remove(event);
    }
    removed
}

/// The settings document viewed as a hook registry.
#[derive(Debug, Clone)]
pub struct HookRegistry {
    doc: JsonDocument,
}

impl HookRegistry {
    pub fn load(settings_path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            doc: JsonDocument::load(settings_path)?,
        })
    }

    pub fn contains(&self, owner: &str) -> bool {
        self.doc
            .field(HOOKS_FIELD)
            .is_some_and(|registry| contains_hook(registry, owner))
    }

    /// See [`merge_hook`].
    pub fn merge(&mut self, owner: &str, declared: &Map<String, Value>) -> bool {
        merge_hook(self.doc.field_mut(HOOKS_FIELD), owner, declared)
    }

    /// See [`remove_hook`].
    pub fn remove(&mut self, owner: &str) -> bool {
        match self.doc.root_mut().get_mut(HOOKS_FIELD) {
            Some(Value::Object(registry)) => remove_hook(registry, owner),
            _ => false,
        }
    }

    /// Write the settings document if it changed.
    pub fn save(&mut self) -> anyhow::Result<bool> {
        self.doc.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::ownership::OWNER_MARKER_FIELD;
    use serde_json::json;

    fn declared(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn registry(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn merge_appends_when_owner_absent() {
        let mut reg = registry(json!({
            "PreToolUse": [{"matcher": "user"}]
        }));

        let existed = merge_hook(
            &mut reg,
            "lint",
            &declared(json!({"PreToolUse": {"matcher": "Bash", "command": "a"}})),
        );

        assert!(!existed);
        let list = reg["PreToolUse"].as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], json!({"matcher": "user"}));
        assert_eq!(list[1][OWNER_MARKER_FIELD], json!("lint"));
    }

    #[test]
    fn merge_replaces_in_place() {
        let mut reg = registry(json!({
            "PreToolUse": [
                {"matcher": "first"},
                {"matcher": "Bash", "command": "a", "_kitsync": "lint"},
                {"matcher": "last"}
            ]
        }));

        let existed = merge_hook(
            &mut reg,
            "lint",
            &declared(json!({"PreToolUse": [{"matcher": "Bash", "command": "b"}]})),
        );

        assert!(existed);
        let list = reg["PreToolUse"].as_array().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0], json!({"matcher": "first"}));
        assert_eq!(list[1]["command"], json!("b"));
        assert_eq!(list[1][OWNER_MARKER_FIELD], json!("lint"));
        assert_eq!(list[2], json!({"matcher": "last"}));
    }

    #[test]
    fn merge_drops_events_no_longer_declared() {
        let mut reg = registry(json!({
            "Stop": [{"command": "old", "_kitsync": "lint"}],
            "Notification": [{"command": "mine"}, {"command": "old", "_kitsync": "lint"}]
        }));

        merge_hook(
            &mut reg,
            "lint",
            &declared(json!({"PreToolUse": {"command": "new"}})),
        );

        assert!(!reg.contains_key("Stop"));
        assert_eq!(reg["Notification"], json!([{"command": "mine"}]));
        assert_eq!(reg["PreToolUse"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn remove_filters_owner_and_prunes_empty_events() {
        let mut reg = registry(json!({
            "PreToolUse": [{"command": "a", "_kitsync": "lint"}],
            "Stop": [{"command": "user"}, {"command": "b", "_kitsync": "lint"}, {"command": "c", "_kitsync": "fmt"}]
        }));

        assert!(remove_hook(&mut reg, "lint"));

        assert!(!reg.contains_key("PreToolUse"));
        assert_eq!(
            reg["Stop"],
            json!([{"command": "user"}, {"command": "c", "_kitsync": "fmt"}])
        );
        assert!(!remove_hook(&mut reg, "lint"));
    }

    #[test]
    fn merge_without_usable_handlers_adds_no_event() {
        let mut reg = registry(json!({
            "Stop": [{"command": "old", "_kitsync": "lint"}]
        }));

        merge_hook(
            &mut reg,
            "lint",
            &declared(json!({"Stop": [], "PreToolUse": ["echo done"]})),
        );

        assert!(reg.is_empty());
        assert!(!contains_hook(&reg, "lint"));
    }

    #[test]
    fn merge_leaves_non_array_event_alone() {
        let mut reg = registry(json!({"Stop": "user string", "Other": {"keep": true}}));

        merge_hook(&mut reg, "lint", &declared(json!({"Stop": {"command": "a"}})));

        assert_eq!(reg["Stop"], json!("user string"));
        assert_eq!(reg["Other"], json!({"keep": true}));
    }

    #[test]
    fn contains_ignores_non_array_events() {
        let reg = registry(json!({"PreToolUse": "broken", "Stop": [{"_kitsync": "fmt"}]}));
        assert!(contains_hook(&reg, "fmt"));
        assert!(!contains_hook(&reg, "lint"));
    }
}
