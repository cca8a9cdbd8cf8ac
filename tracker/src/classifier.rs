//! Telemetry log line classifier.
//!
//! This module decides whether a single line of the editor's `telemetry.log`
//! reports a user action, and if so which one. Classification is a pure
//! function of the line and the ignore list: no I/O, no hidden state.
//!
//! # Line Format
//!
//! Every line starts with a fixed-width prefix holding the timestamp and the
//! opening bracket of the log level:
//!
//! ```text
//! 2023-01-01 00:00:00.000 [trace] telemetry/editorActionInvoked {"properties":{"id":"..."}}
//! |<------ 25 chars ------>|
//! ```
//!
//! # Category Mapping
//!
//! The text between the level bracket and the first `{` is searched for the
//! following markers, in this order. The first marker found wins.
//!
//! | Marker | Category | Field |
//! |--------|----------|-------|
//! | `activityBarAction` | [`ActionCategory::ActivityBarAction`] | `viewletId` |
//! | `editorAction` | [`ActionCategory::EditorAction`] | `id` |
//! | `workbenchAction` | [`ActionCategory::WorkbenchAction`] | `id` |
//! | `Extension:Action` | [`ActionCategory::ExtensionAction`] | `id` |
//!
//! Field values are scraped by the first textual occurrence of `"<key>":"`
//! rather than by parsing the JSON body. A missing key yields an empty action
//! id instead of an error.
//!
//! # Example
//!
//! ```
//! use action_tracker::classifier::{classify, ActionCategory};
//!
//! let line = r#"2023-01-01 00:00:00.000 [trace] telemetry/editorActionInvoked {"properties":{"id":"editor.action.selectAll"}}"#;
//! let action = classify(line, &["vim"]).unwrap();
//! assert_eq!(action.category, ActionCategory::EditorAction);
//! assert_eq!(action.action_id, "editor.action.selectAll");
//! ```

use std::fmt;

use serde::Serialize;

/// Width of the `YYYY-MM-DD HH:MM:SS.mmm [` prefix.
pub const PREFIX_LEN: usize = 25;

/// The only log level that carries action telemetry.
const TRACE_LEVEL: &str = "trace";

/// Offset of the category text after the prefix, skipping `trace] `.
const CATEGORY_OFFSET: usize = 7;

const ID_KEY: &str = "\"id\":\"";
const VIEWLET_ID_KEY: &str = "\"viewletId\":\"";

/// The kind of user action reported by a telemetry line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionCategory {
    /// A view was opened from the activity bar.
    ActivityBarAction,
    /// An editor command (keybinding, context menu, command palette).
    EditorAction,
    /// A workbench-level command.
    WorkbenchAction,
    /// A command contributed by an extension.
    ExtensionAction,
}

impl ActionCategory {
    /// All categories in marker priority order.
    pub const ALL: [ActionCategory; 4] = [
        ActionCategory::ActivityBarAction,
        ActionCategory::EditorAction,
        ActionCategory::WorkbenchAction,
        ActionCategory::ExtensionAction,
    ];

    /// The literal text that identifies this category in a log line.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::ActivityBarAction => "activityBarAction",
            Self::EditorAction => "editorAction",
            Self::WorkbenchAction => "workbenchAction",
            Self::ExtensionAction => "Extension:Action",
        }
    }

    /// The JSON key prefix holding the action id for this category.
    const fn id_key(self) -> &'static str {
        match self {
            Self::ActivityBarAction => VIEWLET_ID_KEY,
            _ => ID_KEY,
        }
    }

    /// Finds the first category whose marker occurs in `text`.
    fn sniff(text: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| text.contains(category.marker()))
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// A recognized user action extracted from a telemetry line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionClassification {
    /// Which kind of action was logged.
    pub category: ActionCategory,

    /// The action identifier, e.g. `editor.action.selectAll`.
    ///
    /// Empty when the line carries a category marker but no id field.
    pub action_id: String,
}

impl ActionClassification {
    /// The message surfaced to the user for this action.
    #[must_use]
    pub fn notification_text(&self) -> String {
        format!("Executed {}", self.action_id)
    }
}

/// Classifies a single telemetry log line.
///
/// Returns `None` when the line is too short, is not at trace level, carries
/// no known category marker, or reports an action matched by `ignore_list`.
///
/// Ignore entries are case-insensitive substrings: `"vim"` suppresses any
/// action id containing `vim` anywhere.
#[must_use]
pub fn classify<S: AsRef<str>>(line: &str, ignore_list: &[S]) -> Option<ActionClassification> {
    let body = line.get(PREFIX_LEN..)?;

    let level = body.get(..TRACE_LEVEL.len())?;
    if !level.eq_ignore_ascii_case(TRACE_LEVEL) {
        return None;
    }

    let brace = body.find('{')?;
    let category_text = body.get(CATEGORY_OFFSET..brace)?;
    let category = ActionCategory::sniff(category_text)?;

    let action_id = extract_field(body, category.id_key());

    if is_ignored(action_id, ignore_list) {
        return None;
    }

    Some(ActionClassification {
        category,
        action_id: action_id.to_string(),
    })
}

/// Returns the text between `key` and the next `"`, or `""` if either is absent.
fn extract_field<'a>(text: &'a str, key: &str) -> &'a str {
    let Some(start) = text.find(key).map(|index| index + key.len()) else {
        return "";
    };
    let value = &text[start..];
    value.find('"').map_or("", |end| &value[..end])
}

/// Case-insensitive substring match of `action_id` against every ignore entry.
fn is_ignored<S: AsRef<str>>(action_id: &str, ignore_list: &[S]) -> bool {
    if ignore_list.is_empty() {
        return false;
    }
    let action_id = action_id.to_lowercase();
    ignore_list
        .iter()
        .any(|pattern| action_id.contains(&pattern.as_ref().to_lowercase()))
}
