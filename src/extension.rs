//! Auxiliary components resolved by identifier at configuration time.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::component::ComponentId;
use crate::model::ClientMetadata;

/// Adds credentials to outgoing requests, using the metadata of the request
/// that delivered the batch.
pub trait RequestAuthenticator: Send + Sync {
    fn apply(&self, metadata: &ClientMetadata, headers: &mut HeaderMap);
}

pub trait Extension: Send + Sync {
    fn id(&self) -> &ComponentId;

    fn as_authenticator(&self) -> Option<&dyn RequestAuthenticator> {
        None
    }
}

/// Registry of extensions keyed by identifier. An empty registry is valid.
#[derive(Clone, Default)]
pub struct Extensions(HashMap<ComponentId, Arc<dyn Extension>>);

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, extension: Arc<dyn Extension>) {
        self.0.insert(extension.id().clone(), extension);
    }

    pub fn get(&self, id: &ComponentId) -> Option<&Arc<dyn Extension>> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.0.keys()).finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderAction {
    /// Set only when the header is absent.
    Insert,
    /// Set only when the header is already present.
    Update,
    Upsert,
    Delete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderSource {
    /// Copy the value of this key from the incoming request metadata.
    FromContext(String),
    Value(String),
}

#[derive(Clone, Debug)]
pub struct HeaderRule {
    pub key: HeaderName,
    pub action: HeaderAction,
    pub source: Option<HeaderSource>,
}

/// Sets headers on outgoing requests from static values or request metadata.
pub struct HeadersSetter {
    id: ComponentId,
    rules: Vec<HeaderRule>,
}

impl HeadersSetter {
    pub const TYPE: &'static str = "headers_setter";

    pub fn new(rules: Vec<HeaderRule>) -> Self {
        Self {
            id: ComponentId::new(Self::TYPE),
            rules,
        }
    }

    /// Forwards the caller's `Authorization` header upstream.
    pub fn authorization_passthrough() -> Self {
        Self::new(vec![HeaderRule {
            key: reqwest::header::AUTHORIZATION,
            action: HeaderAction::Upsert,
            source: Some(HeaderSource::FromContext("authorization".to_string())),
        }])
    }

    fn resolve<'a>(source: &'a HeaderSource, metadata: &'a ClientMetadata) -> Option<&'a str> {
        match source {
            HeaderSource::FromContext(key) => metadata.get(key),
            HeaderSource::Value(value) => Some(value),
        }
    }
}

impl Extension for HeadersSetter {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn as_authenticator(&self) -> Option<&dyn RequestAuthenticator> {
        Some(self)
    }
}

impl RequestAuthenticator for HeadersSetter {
    fn apply(&self, metadata: &ClientMetadata, headers: &mut HeaderMap) {
        for rule in &self.rules {
            if rule.action == HeaderAction::Delete {
                headers.remove(&rule.key);
                continue;
            }

            let Some(raw) = rule
                .source
                .as_ref()
                .and_then(|source| Self::resolve(source, metadata))
            else {
                continue;
            };

            let value = match HeaderValue::from_str(raw) {
                Ok(v) => v,
                Err(e) => {
                    warn!(header = %rule.key, error = %e, "skipping invalid header value");
                    continue;
                }
            };

            let present = headers.contains_key(&rule.key);
            match rule.action {
                HeaderAction::Insert if present => {}
                HeaderAction::Update if !present => {}
                _ => {
                    headers.insert(rule.key.clone(), value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;

    fn metadata_with_auth(value: &str) -> ClientMetadata {
        let mut md = ClientMetadata::new();
        md.append("Authorization", value);
        md
    }

    #[test]
    fn registry_resolves_by_id() {
        let mut extensions = Extensions::new();
        assert!(extensions.is_empty());

        extensions.register(Arc::new(HeadersSetter::authorization_passthrough()));
        let ext = extensions
            .get(&ComponentId::new(HeadersSetter::TYPE))
            .expect("registered");
        assert!(ext.as_authenticator().is_some());
        assert!(extensions.get(&ComponentId::new("oauth2")).is_none());
    }

    #[test]
    fn passthrough_copies_authorization() {
        let setter = HeadersSetter::authorization_passthrough();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Splunk stale"));

        setter.apply(&metadata_with_auth("Splunk 00000000-token"), &mut headers);
        assert_eq!(headers[AUTHORIZATION], "Splunk 00000000-token");
    }

    #[test]
    fn missing_context_value_leaves_headers_alone() {
        let setter = HeadersSetter::authorization_passthrough();
        let mut headers = HeaderMap::new();
        setter.apply(&ClientMetadata::new(), &mut headers);
        assert!(headers.is_empty());
    }

    #[test]
    fn insert_and_update_respect_presence() {
        let key = HeaderName::from_static("x-tenant");
        let setter = HeadersSetter::new(vec![
            HeaderRule {
                key: key.clone(),
                action: HeaderAction::Insert,
                source: Some(HeaderSource::Value("a".to_string())),
            },
            HeaderRule {
                key: key.clone(),
                action: HeaderAction::Insert,
                source: Some(HeaderSource::Value("b".to_string())),
            },
            HeaderRule {
                key: HeaderName::from_static("x-absent"),
                action: HeaderAction::Update,
                source: Some(HeaderSource::Value("c".to_string())),
            },
        ]);

        let mut headers = HeaderMap::new();
        setter.apply(&ClientMetadata::new(), &mut headers);
        assert_eq!(headers[&key], "a");
        assert!(!headers.contains_key("x-absent"));
    }

    #[test]
    fn delete_removes_header() {
        let setter = HeadersSetter::new(vec![HeaderRule {
            key: AUTHORIZATION,
            action: HeaderAction::Delete,
            source: None,
        }]);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer x"));
        setter.apply(&ClientMetadata::new(), &mut headers);
        assert!(headers.is_empty());
    }
}
