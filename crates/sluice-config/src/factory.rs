//! Factory compositions bundled with the sluice library.
//!
//! Small compositions built only from the built-in node classes, each showing
//! one scheduling behavior. They are always available without external files.

use crate::CompositionFile;

/// Factory composition names for external access.
pub static FACTORY_COMPOSITION_NAMES: &[&str] = &[
    "allow_alternating",
    "scatter_gather",
    "feedback_loop",
    "backpressure",
];

/// TOML content for factory compositions, embedded at compile time.
static FACTORY_COMPOSITIONS_TOML: &[(&str, &str)] = &[
    ("allow_alternating", ALLOW_ALTERNATING),
    ("scatter_gather", SCATTER_GATHER),
    ("feedback_loop", FEEDBACK_LOOP),
    ("backpressure", BACKPRESSURE),
];

/// A Door lets every other request through to a logger.
const ALLOW_ALTERNATING: &str = r#"
name = "Allow Alternating"
description = "Logs the 1st, 3rd, 5th... value fired from Fire:fired"

[[nodes]]
name = "Fire"
class = "fire_on_request"

[[nodes]]
name = "Alt"
class = "allow_alternating"

[[nodes]]
name = "Log"
class = "log_value"

[[cables]]
from = "Fire:fired"
to = "Alt:value"

[[cables]]
from = "Alt:allowed"
to = "Log:value"

[[published_outputs]]
name = "allowed"
port = "Alt:allowed"
"#;

/// One event fans out to two branches that join at a single node.
const SCATTER_GATHER: &str = r#"
name = "Scatter Gather"
description = "Two sums computed on separate branches meet in a third; it runs once per event"

[[nodes]]
name = "Start"
class = "fire_on_start"

[[nodes]]
name = "Left"
class = "add"
[nodes.constants]
a = 1
b = 2

[[nodes]]
name = "Right"
class = "add"
[nodes.constants]
a = 10
b = 20

[[nodes]]
name = "Gather"
class = "add"

[[nodes]]
name = "Log"
class = "log_value"

[[cables]]
from = "Start:started"
to = "Left:a"

[[cables]]
from = "Start:started"
to = "Right:a"

[[cables]]
from = "Left:sum"
to = "Gather:a"

[[cables]]
from = "Right:sum"
to = "Gather:b"

[[cables]]
from = "Gather:sum"
to = "Log:value"

[[published_outputs]]
name = "total"
port = "Gather:sum"
"#;

/// A cycle broken by a feedback cable; Echo sees the previous request's value
/// after each forward pass.
const FEEDBACK_LOOP: &str = r#"
name = "Feedback Loop"
description = "Echo logs each value, then receives the previous one back through a feedback cable"

[[nodes]]
name = "Fire"
class = "fire_on_request"

[[nodes]]
name = "Echo"
class = "share_value"

[[nodes]]
name = "Delay"
class = "share_value"

[[nodes]]
name = "Log"
class = "log_value"

[[cables]]
from = "Fire:fired"
to = "Echo:value"

[[cables]]
from = "Echo:same_value"
to = "Log:value"

[[cables]]
from = "Echo:same_value"
to = "Delay:value"

[[cables]]
from = "Delay:same_value"
to = "Echo:value"
feedback = true

[[published_outputs]]
name = "echo"
port = "Echo:same_value"
"#;

/// A fast timer drives a slow node; the Drop policy sheds ticks that arrive
/// while a firing is in flight.
const BACKPRESSURE: &str = r#"
name = "Backpressure"
description = "A 10 ms timer drives a 50 ms wait; ticks that arrive while busy are dropped"

[[nodes]]
name = "Timer"
class = "fire_periodically"
[nodes.policies]
fired = "drop"
[nodes.constants]
seconds = 0.01

[[nodes]]
name = "Delay"
class = "hold_value"
[nodes.constants]
new_value = 50

[[nodes]]
name = "Slow"
class = "wait"

[[nodes]]
name = "Completed"
class = "count"

[[cables]]
from = "Timer:fired"
to = "Delay:refresh"

[[cables]]
from = "Delay:held"
to = "Slow:milliseconds"

[[cables]]
from = "Slow:done"
to = "Completed:increment"

[[published_outputs]]
name = "completed"
port = "Completed:count"
"#;

/// Get all factory compositions.
///
/// Returns a vector of all successfully parsed factory compositions.
pub fn factory_compositions() -> Vec<CompositionFile> {
    FACTORY_COMPOSITIONS_TOML
        .iter()
        .filter_map(|(_, toml)| CompositionFile::from_toml(toml).ok())
        .collect()
}

/// Get a factory composition by identifier or display name (case-insensitive).
///
/// # Example
///
/// ```rust
/// use sluice_config::get_factory_composition;
///
/// let file = get_factory_composition("backpressure").unwrap();
/// assert_eq!(file.name, "Backpressure");
/// assert!(get_factory_composition("Scatter Gather").is_some());
/// ```
pub fn get_factory_composition(name: &str) -> Option<CompositionFile> {
    let name_lower = name.to_lowercase();

    if let Some((_, toml)) = FACTORY_COMPOSITIONS_TOML
        .iter()
        .find(|(id, _)| id.to_lowercase() == name_lower)
    {
        return CompositionFile::from_toml(toml).ok();
    }

    factory_compositions()
        .into_iter()
        .find(|file| file.name.to_lowercase() == name_lower)
}

/// Get the identifiers of all factory compositions.
pub fn factory_composition_names() -> Vec<&'static str> {
    FACTORY_COMPOSITIONS_TOML.iter().map(|(name, _)| *name).collect()
}

/// Check if a name refers to a factory composition.
///
/// ```rust
/// use sluice_config::is_factory_composition;
///
/// assert!(is_factory_composition("feedback_loop"));
/// assert!(is_factory_composition("Feedback Loop"));
/// assert!(!is_factory_composition("my_composition"));
/// ```
pub fn is_factory_composition(name: &str) -> bool {
    get_factory_composition(name).is_some()
}
