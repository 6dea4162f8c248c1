use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde_json::Value;

use crate::{
    config::{FormConfig, default_config_by_schema},
    data::{
        schema::{SchemaError, SchemaNode},
        source::{SharedDataSource, UpdateCallback},
    },
    form::{FormErrors, ValidationErrors},
    nested::NestedCreationController,
};

/// Top-level owner of one form session.
///
/// Holds the settings, the schema text, the shared data source and the
/// controller for the current form. Submitting new schema text replaces the
/// form; the data source survives.
#[derive(Debug)]
pub struct AppData {
    pub config: FormConfig,
    /// Settings file the config was loaded from, if any.
    pub config_path: Option<PathBuf>,
    /// Text of the schema behind the current form.
    pub schema_text: String,
    /// Session-level errors, keyed by field (`schema` for parse failures).
    pub errors: FormErrors,
    pub data_source: SharedDataSource,
    form: Option<NestedCreationController>,
}

impl AppData {
    /// Empty session with the given settings.
    pub fn with_config(config: FormConfig) -> Self {
        Self {
            config,
            config_path: None,
            schema_text: String::new(),
            errors: FormErrors::new(),
            data_source: SharedDataSource::new(),
            form: None,
        }
    }

    /// Load a schema file and its settings.
    ///
    /// When `config` is not given, it is derived from the schema path.
    pub fn new(schema: impl AsRef<Path>, config: Option<impl AsRef<Path>>) -> anyhow::Result<Self> {
        let schema_path = schema.as_ref();
        let config_path = match config {
            Some(c) => c.as_ref().to_path_buf(),
            None => default_config_by_schema(schema_path),
        };
        let form_config = FormConfig::load(&config_path)?;

        let text = fs::read_to_string(schema_path)
            .with_context(|| format!("Failed to read schema {}", schema_path.display()))?;

        let mut app = Self::with_config(form_config);
        app.config_path = Some(config_path);
        app.generate_form(&text)
            .with_context(|| format!("Failed to parse schema {}", schema_path.display()))?;
        Ok(app)
    }

    /// Parse `text` and build a new form from it.
    ///
    /// A parse failure is recorded under `errors["schema"]` and leaves the
    /// previous form in place. Blank text is ignored.
    pub fn generate_form(&mut self, text: &str) -> Result<(), SchemaError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        self.errors.clear();
        let schema = match SchemaNode::parse(text) {
            Ok(s) => s,
            Err(e) => {
                warn!("schema rejected: {e}");
                self.errors.insert(e.field().to_string(), e.to_string());
                return Err(e);
            }
        };
        self.form = Some(NestedCreationController::new(
            &schema,
            &self.config,
            self.data_source.clone(),
        ));
        self.schema_text = text.to_string();
        Ok(())
    }

    pub fn form(&self) -> Option<&NestedCreationController> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut NestedCreationController> {
        self.form.as_mut()
    }

    /// Root schema title with its first letter upper-cased.
    pub fn root_title(&self) -> String {
        let title = self
            .form
            .as_ref()
            .and_then(|f| f.root_schema().title.clone())
            .unwrap_or_default();
        let mut chars = title.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// References offered by the root form.
    pub fn available_refs(&self) -> Vec<String> {
        match &self.form {
            Some(f) => f.root_form().output.available_refs(),
            None => ["root", "parent", "self"].map(String::from).to_vec(),
        }
    }

    /// Register a callback run after every data-source append.
    pub fn on_update_data_source(&self, callback: UpdateCallback) {
        self.data_source.on_update(callback);
    }

    /// Validate the root form and return its values.
    pub fn submit(&mut self) -> Result<Value, ValidationErrors> {
        let Some(form) = self.form.as_mut() else {
            return Ok(Value::Object(Default::default()));
        };
        let root = form.root_form_mut();
        root.validate()?;
        let payload = root.payload();
        info!("form submitted: {payload}");
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use serde_json::json;

    use super::*;
    use crate::data::source::ObjectDataSource;

    const ACCOUNT: &str = r#"{
        "title": "account",
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "address": {"type": "object", "properties": {"city": {"type": "string"}}}
        },
        "required": ["name"]
    }"#;

    #[test]
    fn test_generate_form() {
        let mut app = AppData::with_config(FormConfig::default());
        app.generate_form(ACCOUNT).unwrap();
        assert_eq!(app.root_title(), "Account");
        assert_eq!(app.form().unwrap().root_form().fields().len(), 2);
        assert_eq!(app.available_refs(), vec!["root", "parent", "self"]);
    }

    #[test]
    fn test_parse_error_keeps_previous_form() {
        let mut app = AppData::with_config(FormConfig::default());
        app.generate_form(ACCOUNT).unwrap();

        let err = app.generate_form("{ broken").unwrap_err();
        assert!(matches!(err, SchemaError::Parse { .. }));
        assert!(app.errors["schema"].starts_with("Invalid JSON: "));
        assert_eq!(app.root_title(), "Account");

        app.generate_form(r#"{"title": "other", "properties": {}}"#).unwrap();
        assert!(app.errors.is_empty());
        assert_eq!(app.root_title(), "Other");
    }

    #[test]
    fn test_blank_schema_ignored() {
        let mut app = AppData::with_config(FormConfig::default());
        app.generate_form("   ").unwrap();
        assert!(app.form().is_none());
    }

    #[test]
    fn test_submit() {
        let mut app = AppData::with_config(FormConfig::default());
        app.generate_form(ACCOUNT).unwrap();
        assert!(app.submit().is_err());

        app.form_mut().unwrap().set_value("name", json!("ada")).unwrap();
        assert_eq!(app.submit().unwrap(), json!({"name": "ada"}));
    }

    #[test]
    fn test_data_source_survives_new_schema() {
        let mut app = AppData::with_config(FormConfig::default());
        let updates = Rc::new(Cell::new(0));
        let seen = Rc::clone(&updates);
        app.on_update_data_source(Rc::new(move |_: &ObjectDataSource| seen.set(seen.get() + 1)));

        app.generate_form(ACCOUNT).unwrap();
        let form = app.form_mut().unwrap();
        form.request_create("address").unwrap();
        form.set_value("city", json!("Oslo")).unwrap();
        form.save().unwrap();
        assert_eq!(updates.get(), 1);

        app.generate_form(ACCOUNT).unwrap();
        assert_eq!(app.data_source.with(|ds| ds.entries("address").len()), 1);
    }

    #[test]
    fn test_new_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let schema_path = dir.path().join("account.json");
        fs::write(&schema_path, ACCOUNT).unwrap();
        fs::write(dir.path().join("account-form.toml"), "max_depth = 1\n").unwrap();

        let app = AppData::new(&schema_path, None::<&Path>).unwrap();
        assert_eq!(app.config.max_depth, 1);
        assert_eq!(app.config_path, Some(dir.path().join("account-form.toml")));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "nope").unwrap();
        assert!(AppData::new(&bad, None::<&Path>).is_err());
    }
}
