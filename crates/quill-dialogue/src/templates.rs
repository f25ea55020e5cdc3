//! Letter template catalog.

use serde::ser::{Serialize, SerializeMap, Serializer};

use quill_core::{QuillError, Result, Template};

/// Immutable catalog of letter templates, keyed by unique name.
///
/// Insertion order is kept so the serialized catalog reads the same way on
/// every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
}

impl TemplateRegistry {
    /// Build a registry, rejecting duplicate names and templates without fields.
    pub fn new(templates: Vec<Template>) -> Result<Self> {
        if templates.is_empty() {
            return Err(QuillError::Template(
                "registry needs at least one template".to_string(),
            ));
        }
        for (i, template) in templates.iter().enumerate() {
            if template.name.trim().is_empty() {
                return Err(QuillError::Template("template name is empty".to_string()));
            }
            if template.required_fields.is_empty() {
                return Err(QuillError::Template(format!(
                    "template '{}' has no required fields",
                    template.name
                )));
            }
            if templates[..i].iter().any(|t| t.name == template.name) {
                return Err(QuillError::Template(format!(
                    "duplicate template name '{}'",
                    template.name
                )));
            }
        }
        Ok(Self { templates })
    }

    /// The catalog shipped with the application.
    pub fn builtin() -> Self {
        Self {
            templates: vec![
                Template::new(
                    "bank_account_closure",
                    ["Name", "Account Number", "Mobile Number", "Date", "Place"],
                ),
                Template::new(
                    "address_change",
                    ["Name", "Account Number", "Old Address", "New Address", "Date"],
                ),
                Template::new(
                    "aadhaar_update",
                    ["Name", "Aadhaar Number", "PAN Number", "Date", "Place"],
                ),
            ],
        }
    }

    /// Use `templates` if any are configured, otherwise the built-in catalog.
    pub fn from_config(templates: &[Template]) -> Result<Self> {
        if templates.is_empty() {
            Ok(Self::builtin())
        } else {
            Self::new(templates.to_vec())
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Compact JSON object mapping each name to its ordered field list.
    pub fn serialize_all(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for TemplateRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.templates.len()))?;
        for template in &self.templates {
            map.serialize_entry(&template.name, &template.required_fields)?;
        }
        map.end()
    }
}
