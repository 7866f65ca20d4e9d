// src/settings/document.rs

//! Typed view over a settings JSON document
//!
//! Only the two collections the merger owns are modeled: `hooks` (grouped by
//! event and matcher) and `mcpServers` (keyed by name). Every other top-level
//! field, and every unknown field inside hook groups, hook entries and service
//! entries, is carried through untouched and in its original order.

use crate::filesystem::atomic_write_json;
use crate::normalize::normalize;
use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

const HOOKS_KEY: &str = "hooks";
const SERVICES_KEY: &str = "mcpServers";
const LAST_MODIFIED_KEY: &str = "lastModified";

/// Identity of a hook group: event name plus optional tool matcher
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EventMatcher {
    pub event: String,
    pub matcher: Option<String>,
}

impl EventMatcher {
    /// An empty matcher string is the same as no matcher
    pub fn new(event: impl Into<String>, matcher: Option<&str>) -> Self {
        Self {
            event: event.into(),
            matcher: matcher.filter(|m| !m.is_empty()).map(str::to_string),
        }
    }
}

impl fmt::Display for EventMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.matcher {
            Some(matcher) => write!(f, "{}[{}]", self.event, matcher),
            None => write!(f, "{}", self.event),
        }
    }
}

fn default_hook_type() -> String {
    "command".to_string()
}

/// One hook action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookEntry {
    #[serde(rename = "type", default = "default_hook_type")]
    pub kind: String,
    #[serde(default)]
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Kit that contributed this entry, when known; never persisted
    #[serde(skip)]
    pub origin_kit: Option<String>,
}

impl HookEntry {
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            kind: default_hook_type(),
            command: command.into(),
            timeout: None,
            extra: Map::new(),
            origin_kit: None,
        }
    }

    /// Identity used for deduplication
    ///
    /// The normalized command, or for entries without one (prompt hooks and
    /// the like) the normalized type plus remaining fields.
    pub fn identity(&self) -> String {
        let command = normalize(&self.command);
        if !command.is_empty() {
            return command;
        }
        let extra = serde_json::to_string(&self.extra).unwrap_or_default();
        normalize(&format!("{} {}", self.kind, extra))
    }

    /// Text shown for this entry in conflict reports
    pub fn label(&self) -> String {
        if self.command.trim().is_empty() {
            self.identity()
        } else {
            self.command.clone()
        }
    }

    pub fn with_origin(mut self, kit_id: impl Into<String>) -> Self {
        self.origin_kit = Some(kit_id.into());
        self
    }
}

/// A matcher and the hooks that run for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
    #[serde(default)]
    pub hooks: Vec<HookEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HookGroup {
    pub fn new(matcher: Option<&str>, hooks: Vec<HookEntry>) -> Self {
        Self {
            matcher: matcher.map(str::to_string),
            hooks,
            extra: Map::new(),
        }
    }

    pub fn event_matcher(&self, event: &str) -> EventMatcher {
        EventMatcher::new(event, self.matcher.as_deref())
    }
}

/// All hook groups registered for one event
#[derive(Debug, Clone, PartialEq)]
pub struct EventHooks {
    pub event: String,
    pub groups: Vec<HookGroup>,
}

/// A named service definition
///
/// `spec` holds the whole JSON object, `lastModified` included, so the entry
/// is written back exactly as it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEntry {
    pub name: String,
    pub spec: Map<String, Value>,
}

impl ServiceEntry {
    pub fn new(name: impl Into<String>, spec: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }

    /// Parsed `lastModified`: an RFC 3339 string or epoch milliseconds
    ///
    /// Values in any other shape count as missing.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        match self.spec.get(LAST_MODIFIED_KEY)? {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Number(n) => n
                .as_i64()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
            _ => None,
        }
    }

    /// Connection spec without the timestamp, for content comparison
    pub fn connection_spec(&self) -> Map<String, Value> {
        let mut spec = self.spec.clone();
        spec.remove(LAST_MODIFIED_KEY);
        spec
    }
}

/// A settings document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsDocument {
    /// The full top-level object as read; `hooks` and `mcpServers` are
    /// rewritten from the typed fields on output
    passthrough: Map<String, Value>,
    pub hooks: Vec<EventHooks>,
    pub services: Vec<ServiceEntry>,
}

impl SettingsDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a parsed JSON value
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        let passthrough: Map<String, Value> = serde_json::from_value(value)?;

        let mut hooks = Vec::new();
        if let Some(raw) = passthrough.get(HOOKS_KEY) {
            let events: Map<String, Value> = serde_json::from_value(raw.clone())?;
            for (event, groups) in events {
                let groups: Vec<HookGroup> = serde_json::from_value(groups)?;
                hooks.push(EventHooks { event, groups });
            }
        }

        let mut services = Vec::new();
        if let Some(raw) = passthrough.get(SERVICES_KEY) {
            let entries: Map<String, Value> = serde_json::from_value(raw.clone())?;
            for (name, spec) in entries {
                let spec: Map<String, Value> = serde_json::from_value(spec)?;
                services.push(ServiceEntry { name, spec });
            }
        }

        Ok(Self {
            passthrough,
            hooks,
            services,
        })
    }

    /// Parse from JSON text
    pub fn from_json_str(content: &str) -> serde_json::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Self::from_value(serde_json::from_str(content)?)
    }

    /// Render back to JSON
    ///
    /// Passthrough fields keep their position. `hooks` and `mcpServers` are
    /// written when present in the input or non-empty.
    pub fn to_value(&self) -> Value {
        let mut out = self.passthrough.clone();

        if !self.hooks.is_empty() || out.contains_key(HOOKS_KEY) {
            let mut events = Map::new();
            for event in &self.hooks {
                let groups = serde_json::to_value(&event.groups).unwrap_or(Value::Null);
                events.insert(event.event.clone(), groups);
            }
            out.insert(HOOKS_KEY.to_string(), Value::Object(events));
        }

        if !self.services.is_empty() || out.contains_key(SERVICES_KEY) {
            let mut entries = Map::new();
            for service in &self.services {
                entries.insert(service.name.clone(), Value::Object(service.spec.clone()));
            }
            out.insert(SERVICES_KEY.to_string(), Value::Object(entries));
        }

        Value::Object(out)
    }

    /// Load a settings file; a missing file is an empty document
    ///
    /// A file that exists but does not parse is an error. The caller must not
    /// write over a document it could not read.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No settings at {}, starting empty", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::IoError(format!(
                    "Failed to read settings {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        Self::from_json_str(&content).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Atomically write the document
    pub fn save(&self, path: &Path) -> Result<()> {
        atomic_write_json(path, &self.to_value())
    }

    /// Top-level fields other than the merged collections
    pub fn passthrough(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.passthrough
            .iter()
            .filter(|(k, _)| k.as_str() != HOOKS_KEY && k.as_str() != SERVICES_KEY)
    }

    /// Every hook entry with its event matcher, in document order
    pub fn hook_entries(&self) -> impl Iterator<Item = (EventMatcher, &HookEntry)> {
        self.hooks.iter().flat_map(|event| {
            event.groups.iter().flat_map(move |group| {
                let matcher = group.event_matcher(&event.event);
                group.hooks.iter().map(move |hook| (matcher.clone(), hook))
            })
        })
    }

    pub fn service(&self, name: &str) -> Option<&ServiceEntry> {
        self.services.iter().find(|s| s.name == name)
    }
}
