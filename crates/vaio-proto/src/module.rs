//! Module records as served by the backend and kept in the local cache.

use serde::{Deserialize, Serialize};

use crate::ids::ModuleType;

const fn default_true() -> bool {
    true
}

/// One row of `GET /api/modules`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Backend row id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Display name.
    pub name: String,
    /// Module path or key.
    #[serde(default)]
    pub module: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Module category.
    pub module_type: ModuleType,
    /// Grouping label in the launcher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Legacy component name.
    #[serde(rename = "paneComponent", default, skip_serializing_if = "Option::is_none")]
    pub pane_component: Option<String>,
    /// Component implementation name.
    #[serde(rename = "staticIdentifier", default, skip_serializing_if = "Option::is_none")]
    pub static_identifier: Option<String>,
    /// Size hint (`small`, `medium`, `large`).
    #[serde(rename = "defaultSize", default, skip_serializing_if = "Option::is_none")]
    pub default_size: Option<String>,
    /// Shown in the launcher.
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Reports a service status.
    #[serde(rename = "supportsStatus", default)]
    pub supports_status: bool,
    /// Socket namespace streaming this module's data.
    #[serde(rename = "socketNamespace", default, skip_serializing_if = "Option::is_none")]
    pub socket_namespace: Option<String>,
    /// Launched on first start.
    #[serde(default)]
    pub autostart: bool,
    /// Launcher icon.
    #[serde(rename = "logoUrl", default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    /// Installed on the host.
    #[serde(default = "default_true")]
    pub is_installed: bool,
}

impl ModuleRecord {
    /// Minimal record with the given type and identifier.
    #[must_use]
    pub fn new(
        module_type: ModuleType,
        static_identifier: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let static_identifier = static_identifier.into();
        Self {
            id: None,
            name: name.into(),
            module: static_identifier.clone(),
            description: None,
            module_type,
            category: None,
            pane_component: None,
            static_identifier: Some(static_identifier),
            default_size: None,
            visible: true,
            supports_status: false,
            socket_namespace: None,
            autostart: false,
            logo_url: None,
            is_installed: true,
        }
    }

    /// Component implementation name.
    ///
    /// Falls back to `paneComponent`, then to the capitalized module key
    /// suffixed with `Pane`.
    #[must_use]
    pub fn resolved_static_identifier(&self) -> String {
        if let Some(id) = self.static_identifier.as_deref().filter(|s| !s.is_empty()) {
            return id.to_string();
        }
        if let Some(id) = self.pane_component.as_deref().filter(|s| !s.is_empty()) {
            return id.to_string();
        }
        let key = if self.module.is_empty() { &self.name } else { &self.module };
        let mut chars = key.chars();
        let capitalized: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            None => String::new(),
        };
        format!("{capitalized}Pane")
    }
}

/// Request body for `POST /api/modules/{type}` and `PUT /api/modules/{type}/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDraft {
    /// Display name.
    pub name: String,
    /// Legacy component name.
    #[serde(rename = "paneComponent", skip_serializing_if = "Option::is_none")]
    pub pane_component: Option<String>,
    /// Component implementation name.
    #[serde(rename = "staticIdentifier", skip_serializing_if = "Option::is_none")]
    pub static_identifier: Option<String>,
    /// Shown in the launcher.
    pub visible: bool,
    /// Reports a service status.
    #[serde(rename = "supportsStatus")]
    pub supports_status: bool,
    /// Module category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_type: Option<ModuleType>,
    /// Socket namespace.
    #[serde(rename = "socketNamespace", skip_serializing_if = "Option::is_none")]
    pub socket_namespace: Option<String>,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Grouping label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Values grouped by module type. All three groups are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulesByType<T> {
    /// SYSTEM entries.
    #[serde(rename = "SYSTEM", default = "Vec::new")]
    pub system: Vec<T>,
    /// SERVICE entries.
    #[serde(rename = "SERVICE", default = "Vec::new")]
    pub service: Vec<T>,
    /// USER entries.
    #[serde(rename = "USER", default = "Vec::new")]
    pub user: Vec<T>,
}

impl<T> Default for ModulesByType<T> {
    fn default() -> Self {
        Self {
            system: Vec::new(),
            service: Vec::new(),
            user: Vec::new(),
        }
    }
}

impl<T> ModulesByType<T> {
    /// Entries of one type.
    #[must_use]
    pub fn get(&self, module_type: ModuleType) -> &[T] {
        match module_type {
            ModuleType::System => &self.system,
            ModuleType::Service => &self.service,
            ModuleType::User => &self.user,
        }
    }

    /// Mutable entries of one type.
    pub fn get_mut(&mut self, module_type: ModuleType) -> &mut Vec<T> {
        match module_type {
            ModuleType::System => &mut self.system,
            ModuleType::Service => &mut self.service,
            ModuleType::User => &mut self.user,
        }
    }

    /// Types paired with their entries.
    pub fn iter(&self) -> impl Iterator<Item = (ModuleType, &[T])> {
        ModuleType::ALL.into_iter().map(move |t| (t, self.get(t)))
    }

    /// Total number of entries.
    #[must_use]
    pub fn total(&self) -> usize {
        self.system.len() + self.service.len() + self.user.len()
    }

    /// Whether every group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Transform every entry, keeping the grouping.
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> ModulesByType<U> {
        ModulesByType {
            system: self.system.iter().map(&mut f).collect(),
            service: self.service.iter().map(&mut f).collect(),
            user: self.user.iter().map(&mut f).collect(),
        }
    }
}

impl ModulesByType<ModuleRecord> {
    /// Group a flat record list by `module_type`.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = ModuleRecord>) -> Self {
        let mut grouped = Self::default();
        for record in records {
            grouped.get_mut(record.module_type).push(record);
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_parses_backend_row() {
        let json = r#"{
            "id": 7,
            "name": "Nvidia",
            "module": "nvidia",
            "module_type": "SERVICE",
            "staticIdentifier": "NvidiaPane",
            "socketNamespace": "/gpu",
            "supportsStatus": true
        }"#;
        let record: ModuleRecord = serde_json::from_str(json).expect("parse");
        assert_eq!(record.id, Some(7));
        assert_eq!(record.module_type, ModuleType::Service);
        assert_eq!(record.socket_namespace.as_deref(), Some("/gpu"));
        assert!(record.visible);
        assert!(record.is_installed);
        assert_eq!(record.resolved_static_identifier(), "NvidiaPane");
    }

    #[test]
    fn static_identifier_fallbacks() {
        let mut record = ModuleRecord::new(ModuleType::System, "CpuPane", "CPU");
        record.static_identifier = None;
        record.pane_component = Some("CpuGraphPane".into());
        assert_eq!(record.resolved_static_identifier(), "CpuGraphPane");

        record.pane_component = None;
        record.module = "supervisor".into();
        assert_eq!(record.resolved_static_identifier(), "SupervisorPane");
    }

    #[test]
    fn grouping_keeps_all_types() {
        let grouped = ModulesByType::from_records(vec![
            ModuleRecord::new(ModuleType::System, "SupervisorPane", "Supervisor"),
            ModuleRecord::new(ModuleType::Service, "NvidiaPane", "Nvidia"),
        ]);
        assert_eq!(grouped.system.len(), 1);
        assert_eq!(grouped.service.len(), 1);
        assert!(grouped.user.is_empty());

        let json = serde_json::to_value(&grouped).expect("serialize");
        assert!(json["USER"].as_array().is_some_and(Vec::is_empty));
    }
}
