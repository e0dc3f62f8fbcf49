//! Content templates with `{name}` placeholders
//!
//! Substitution is a single pass over the template text: values are inserted
//! literally and never expanded again, and braces that do not enclose an
//! identifier are left untouched. Every placeholder must resolve, either
//! from the caller's variables or from the template's defaults.

use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, LazyLock};

use crate::error::CastdeckError;
use crate::types::{now_secs, ContentTemplate};
use crate::{Database, Result};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("valid placeholder regex"));

pub const MIN_NAME_CHARS: usize = 3;
pub const MIN_CONTENT_CHARS: usize = 10;

#[derive(Clone)]
pub struct TemplateService {
    db: Arc<Database>,
}

impl TemplateService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a new template
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the trimmed name is shorter than 3
    /// characters or the trimmed content shorter than 10.
    pub async fn create(
        &self,
        name: &str,
        content: &str,
        variables: BTreeMap<String, String>,
    ) -> Result<ContentTemplate> {
        if name.trim().chars().count() < MIN_NAME_CHARS {
            return Err(CastdeckError::InvalidArgument(format!(
                "name must be at least {} characters",
                MIN_NAME_CHARS
            )));
        }
        if content.trim().chars().count() < MIN_CONTENT_CHARS {
            return Err(CastdeckError::InvalidArgument(format!(
                "content must be at least {} characters",
                MIN_CONTENT_CHARS
            )));
        }

        let template = ContentTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            content: content.to_string(),
            variables,
            created_at: now_secs(),
        };
        self.db.insert_template(&template).await?;

        tracing::debug!(template_id = %template.id, "Template created");
        Ok(template)
    }

    pub async fn get(&self, template_id: &str) -> Result<ContentTemplate> {
        self.db
            .get_template(template_id)
            .await?
            .ok_or_else(|| CastdeckError::not_found("Template", template_id))
    }

    pub async fn list(&self) -> Result<Vec<ContentTemplate>> {
        self.db.list_templates().await
    }

    /// Render a stored template
    ///
    /// # Errors
    ///
    /// - `NotFound` if the template does not exist
    /// - `InvalidArgument` naming every placeholder left unresolved
    pub async fn apply(
        &self,
        template_id: &str,
        variables: &HashMap<String, String>,
    ) -> Result<String> {
        let template = self.get(template_id).await?;
        render(&template.content, &template.variables, variables)
    }

    /// Returns true if the template existed
    pub async fn delete(&self, template_id: &str) -> Result<bool> {
        self.db.delete_template(template_id).await
    }
}

/// Placeholder names in order of first appearance
pub fn placeholders(content: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    PLACEHOLDER
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Substitute placeholders; `variables` take precedence over `defaults`
pub fn render(
    content: &str,
    defaults: &BTreeMap<String, String>,
    variables: &HashMap<String, String>,
) -> Result<String> {
    let lookup = |name: &str| variables.get(name).or_else(|| defaults.get(name));

    let missing: Vec<String> = placeholders(content)
        .into_iter()
        .filter(|name| lookup(name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(CastdeckError::InvalidArgument(format!(
            "missing template variables: {}",
            missing.join(", ")
        )));
    }

    let rendered = PLACEHOLDER.replace_all(content, |caps: &Captures| {
        lookup(&caps[1]).cloned().unwrap_or_default()
    });
    Ok(rendered.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_db;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_basic() {
        let out = render("Hi {name}!", &BTreeMap::new(), &vars(&[("name", "Ann")])).unwrap();
        assert_eq!(out, "Hi Ann!");
    }

    #[test]
    fn test_render_missing_lists_every_key() {
        let err = render("{greeting} {name}, {greeting}", &BTreeMap::new(), &HashMap::new())
            .unwrap_err();
        match err {
            CastdeckError::InvalidArgument(msg) => {
                assert_eq!(msg, "missing template variables: greeting, name")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_render_uses_defaults_but_caller_wins() {
        let mut defaults = BTreeMap::new();
        defaults.insert("brand".to_string(), "Castdeck".to_string());
        defaults.insert("name".to_string(), "friend".to_string());

        let out = render("{brand} says hi {name}", &defaults, &HashMap::new()).unwrap();
        assert_eq!(out, "Castdeck says hi friend");

        let out = render("{brand} says hi {name}", &defaults, &vars(&[("name", "Bo")])).unwrap();
        assert_eq!(out, "Castdeck says hi Bo");
    }

    #[test]
    fn test_render_is_single_pass() {
        // A value that looks like a placeholder is inserted verbatim
        let out = render(
            "{a} and {b}",
            &BTreeMap::new(),
            &vars(&[("a", "{b}"), ("b", "B")]),
        )
        .unwrap();
        assert_eq!(out, "{b} and B");
    }

    #[test]
    fn test_render_leaves_other_braces() {
        let out = render(
            "json {} {not valid} {{x}} {x}",
            &BTreeMap::new(),
            &vars(&[("x", "1")]),
        )
        .unwrap();
        assert_eq!(out, "json {} {not valid} {1} 1");
    }

    #[test]
    fn test_unused_variables_are_ignored() {
        let out = render("plain text", &BTreeMap::new(), &vars(&[("x", "1")])).unwrap();
        assert_eq!(out, "plain text");
    }

    #[tokio::test]
    async fn test_create_validates_lengths() {
        let (db, _temp_dir) = test_db().await;
        let service = TemplateService::new(Arc::new(db));

        let err = service
            .create(" ab ", "long enough content", BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CastdeckError::InvalidArgument(ref m) if m.contains("name")));

        let err = service
            .create("promo", "   short   ", BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CastdeckError::InvalidArgument(ref m) if m.contains("content")));
    }

    #[tokio::test]
    async fn test_apply_and_delete() {
        let (db, _temp_dir) = test_db().await;
        let service = TemplateService::new(Arc::new(db));

        let template = service
            .create("greeting", "Hi {name}! Welcome aboard.", BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(service.list().await.unwrap().len(), 1);

        let out = service
            .apply(&template.id, &vars(&[("name", "Ann")]))
            .await
            .unwrap();
        assert_eq!(out, "Hi Ann! Welcome aboard.");

        assert!(matches!(
            service.apply(&template.id, &HashMap::new()).await,
            Err(CastdeckError::InvalidArgument(_))
        ));

        assert!(service.delete(&template.id).await.unwrap());
        assert!(!service.delete(&template.id).await.unwrap());
        assert!(matches!(
            service.apply(&template.id, &HashMap::new()).await,
            Err(CastdeckError::NotFound(_))
        ));
    }
}
