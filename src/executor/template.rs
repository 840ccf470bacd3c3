//! Host path templating against the cluster-info map.
//!
//! Bind host paths may reference cluster facts as `{{.KEY}}` (the leading
//! dot is optional). Rendering is strict: an unknown key is an error.

use crate::error::{AppError, Result};
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use tracing::debug;

/// Template engine for bind host paths
#[derive(Debug, Clone)]
pub struct HostPathTemplate {
    placeholder: Regex,
}

impl HostPathTemplate {
    pub fn new() -> Result<Self> {
        let placeholder = Regex::new(r"\{\{\s*\.?([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
            .map_err(|e| AppError::InternalServerError(format!("Regex compilation failed: {}", e)))?;
        Ok(Self { placeholder })
    }

    pub fn render(&self, template: &str, info: &BTreeMap<String, String>) -> Result<String> {
        let mut missing = Vec::new();
        let rendered = self
            .placeholder
            .replace_all(template, |caps: &Captures| match info.get(&caps[1]) {
                Some(value) => value.clone(),
                None => {
                    missing.push(caps[1].to_string());
                    String::new()
                }
            })
            .into_owned();

        if !missing.is_empty() {
            return Err(AppError::TranslationError(format!(
                "host path template {:?} references unknown cluster info keys: {}",
                template,
                missing.join(", ")
            )));
        }
        if rendered.contains("{{") || rendered.contains("}}") {
            return Err(AppError::TranslationError(format!(
                "malformed host path template {:?}",
                template
            )));
        }

        debug!("🔄 Rendered host path {:?} -> {:?}", template, rendered);
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> BTreeMap<String, String> {
        [
            ("DICE_STORAGE_MOUNTPOINT".to_string(), "/netdata".to_string()),
            ("DICE_CLUSTER_NAME".to_string(), "dev".to_string()),
        ]
        .into()
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let engine = HostPathTemplate::new().unwrap();
        let out = engine
            .render("{{.DICE_STORAGE_MOUNTPOINT}}/cache/{{ DICE_CLUSTER_NAME }}", &info())
            .unwrap();
        assert_eq!(out, "/netdata/cache/dev");
    }

    #[test]
    fn test_plain_paths_pass_through() {
        let engine = HostPathTemplate::new().unwrap();
        assert_eq!(engine.render("/var/lib/docker", &info()).unwrap(), "/var/lib/docker");
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let engine = HostPathTemplate::new().unwrap();
        let err = engine.render("{{.NOPE}}/x", &info()).unwrap_err();
        assert!(matches!(err, AppError::TranslationError(msg) if msg.contains("NOPE")));
    }

    #[test]
    fn test_unterminated_placeholder_is_an_error() {
        let engine = HostPathTemplate::new().unwrap();
        assert!(engine.render("{{.DICE_CLUSTER_NAME", &info()).is_err());
    }
}
