//! Module types, pane identifiers and instance ids.
//!
//! The wire format of a pane id is `TYPE-staticIdentifier-instanceId`. The
//! static identifier never contains the separator; the instance id may, so
//! parsing joins every segment after the second back together.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Separator between pane id segments.
pub const SEPARATOR: char = '-';

/// Length of generated instance ids.
pub const INSTANCE_ID_LEN: usize = 5;

const INSTANCE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Category of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModuleType {
    /// Host-level panes (CPU, memory, supervisor).
    System,
    /// Panes bound to a managed service.
    Service,
    /// User-defined panes.
    User,
}

impl ModuleType {
    /// All module types in canonical order.
    pub const ALL: [Self; 3] = [Self::System, Self::Service, Self::User];

    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::Service => "SERVICE",
            Self::User => "USER",
        }
    }

    /// Parse a module type, ignoring case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleType {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ProtoError::InvalidModuleType(s.to_string()))
    }
}

/// Upper-cased prefix of an identifier, used for categorization.
///
/// `"system-SupervisorPane-ab12c"` becomes `"SYSTEM"`, `"service"` becomes
/// `"SERVICE"` and the empty string stays empty.
#[must_use]
pub fn canonical_key(input: &str) -> String {
    input
        .split(SEPARATOR)
        .next()
        .unwrap_or_default()
        .to_uppercase()
}

/// Number of separator-delimited segments in a key.
///
/// Base keys (`TYPE-staticIdentifier`) have at most two segments, instance
/// keys have three or more.
#[must_use]
pub fn segment_count(key: &str) -> usize {
    key.split(SEPARATOR).count()
}

/// Build a wire pane id.
///
/// Returns an empty string when the module type or static identifier is
/// missing.
#[must_use]
pub fn create_pane_id(
    module_type: &str,
    static_identifier: &str,
    instance_id: Option<&str>,
) -> String {
    let module_type = canonical_key(module_type);
    if module_type.is_empty() || static_identifier.is_empty() {
        return String::new();
    }
    match instance_id.filter(|id| !id.is_empty()) {
        Some(instance) => {
            format!("{module_type}{SEPARATOR}{static_identifier}{SEPARATOR}{instance}")
        }
        None => format!("{module_type}{SEPARATOR}{static_identifier}"),
    }
}

/// Components of a parsed wire pane id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPaneId {
    /// Module category.
    pub module_type: ModuleType,
    /// Implementation name, e.g. `SupervisorPane`.
    pub static_identifier: String,
    /// Instance token, absent for base keys.
    pub instance_id: Option<String>,
}

/// Split a wire pane id into its parts.
///
/// Returns `None` for anything malformed; callers drop such items.
#[must_use]
pub fn parse_pane_id(pane_id: &str) -> Option<ParsedPaneId> {
    let mut parts = pane_id.split(SEPARATOR);
    let module_type = ModuleType::parse(parts.next()?)?;
    let static_identifier = parts.next().filter(|s| !s.is_empty())?;
    let rest: Vec<&str> = parts.collect();
    let instance_id = if rest.is_empty() {
        None
    } else {
        let joined = rest.join("-");
        if joined.is_empty() {
            return None;
        }
        Some(joined)
    };
    Some(ParsedPaneId {
        module_type,
        static_identifier: static_identifier.to_string(),
        instance_id,
    })
}

/// Random token distinguishing concurrent instances of one module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Wrap an existing token.
    pub fn new(id: impl Into<String>) -> Result<Self, ProtoError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ProtoError::InvalidInstanceId(id));
        }
        Ok(Self(id))
    }

    /// Generate a fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        Self(random_token(INSTANCE_ID_LEN))
    }

    /// The token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(INSTANCE_ALPHABET[rng.gen_range(0..INSTANCE_ALPHABET.len())]))
        .collect()
}

/// Generate a short random instance id.
///
/// Collisions are possible; use [`generate_unique_instance_id`] when the
/// currently active set is known.
#[must_use]
pub fn generate_instance_id() -> InstanceId {
    InstanceId::generate()
}

/// Generate an instance id not rejected by `is_taken`.
#[must_use]
pub fn generate_unique_instance_id(is_taken: impl Fn(&str) -> bool) -> InstanceId {
    const MAX_ATTEMPTS: usize = 32;
    for _ in 0..MAX_ATTEMPTS {
        let candidate = InstanceId::generate();
        if !is_taken(candidate.as_str()) {
            return candidate;
        }
    }
    // The short alphabet is saturated; widen the token until it is free.
    let mut len = INSTANCE_ID_LEN * 2;
    loop {
        let candidate = InstanceId(random_token(len));
        if !is_taken(candidate.as_str()) {
            return candidate;
        }
        len += 1;
    }
}

/// Typed pane identifier.
///
/// Serializes to and from the wire string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PaneId {
    module_type: ModuleType,
    static_identifier: String,
    instance_id: Option<InstanceId>,
}

impl PaneId {
    /// Create a pane id.
    ///
    /// # Errors
    ///
    /// Returns an error if the static identifier is empty or contains the
    /// separator.
    pub fn new(
        module_type: ModuleType,
        static_identifier: impl Into<String>,
        instance_id: Option<InstanceId>,
    ) -> Result<Self, ProtoError> {
        let static_identifier = static_identifier.into();
        if static_identifier.is_empty() || static_identifier.contains(SEPARATOR) {
            return Err(ProtoError::InvalidPaneId(format!(
                "static identifier '{static_identifier}' is empty or contains '{SEPARATOR}'"
            )));
        }
        Ok(Self {
            module_type,
            static_identifier,
            instance_id,
        })
    }

    /// Create a type-level (base) id without an instance.
    pub fn base(
        module_type: ModuleType,
        static_identifier: impl Into<String>,
    ) -> Result<Self, ProtoError> {
        Self::new(module_type, static_identifier, None)
    }

    /// Parse a wire pane id.
    pub fn parse(s: &str) -> Result<Self, ProtoError> {
        let parsed = parse_pane_id(s).ok_or_else(|| ProtoError::InvalidPaneId(s.to_string()))?;
        let instance_id = parsed.instance_id.map(InstanceId);
        Self::new(parsed.module_type, parsed.static_identifier, instance_id)
    }

    /// Module category.
    #[must_use]
    pub const fn module_type(&self) -> ModuleType {
        self.module_type
    }

    /// Implementation name.
    #[must_use]
    pub fn static_identifier(&self) -> &str {
        &self.static_identifier
    }

    /// Instance token, if this is an instance id.
    #[must_use]
    pub const fn instance_id(&self) -> Option<&InstanceId> {
        self.instance_id.as_ref()
    }

    /// Whether this id names a concrete instance.
    #[must_use]
    pub const fn is_instance(&self) -> bool {
        self.instance_id.is_some()
    }

    /// The `TYPE-staticIdentifier` key shared by every instance.
    #[must_use]
    pub fn base_key(&self) -> String {
        create_pane_id(self.module_type.as_str(), &self.static_identifier, None)
    }

    /// Same module, different instance.
    #[must_use]
    pub fn with_instance(&self, instance_id: InstanceId) -> Self {
        Self {
            module_type: self.module_type,
            static_identifier: self.static_identifier.clone(),
            instance_id: Some(instance_id),
        }
    }
}

impl fmt::Display for PaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&create_pane_id(
            self.module_type.as_str(),
            &self.static_identifier,
            self.instance_id.as_ref().map(InstanceId::as_str),
        ))
    }
}

impl FromStr for PaneId {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PaneId {
    type Error = ProtoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PaneId> for String {
    fn from(id: PaneId) -> Self {
        id.to_string()
    }
}
