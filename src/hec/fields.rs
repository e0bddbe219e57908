//! Splits attribute sets into HEC structural fields and free-form `fields`.

use serde_json::{Map, Value as JsonValue};
use std::fmt;

use crate::model::{AttributeValue, Attributes};

pub const HOST_NAME_KEY: &str = "host.name";
pub const SOURCE_KEY: &str = "com.splunk.source";
pub const SOURCETYPE_KEY: &str = "com.splunk.sourcetype";
pub const INDEX_KEY: &str = "com.splunk.index";
pub const HEC_TOKEN_KEY: &str = "com.splunk.hec.access_token";

/// Host reported when no host attribute is present.
pub const UNKNOWN_HOST: &str = "unknown";

/// Attribute keys with structural meaning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservedKeys {
    pub host: String,
    pub source: String,
    pub sourcetype: String,
    pub index: String,
    pub token: String,
}

impl Default for ReservedKeys {
    fn default() -> Self {
        Self {
            host: HOST_NAME_KEY.to_string(),
            source: SOURCE_KEY.to_string(),
            sourcetype: SOURCETYPE_KEY.to_string(),
            index: INDEX_KEY.to_string(),
            token: HEC_TOKEN_KEY.to_string(),
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct ExtractedFields {
    pub host: String,
    pub source: String,
    pub sourcetype: String,
    pub index: String,
    /// Access token, if one was present. Never copied into an event.
    pub token: Option<String>,
    pub fields: Map<String, JsonValue>,
}

impl Default for ExtractedFields {
    fn default() -> Self {
        Self {
            host: UNKNOWN_HOST.to_string(),
            source: String::new(),
            sourcetype: String::new(),
            index: String::new(),
            token: None,
            fields: Map::new(),
        }
    }
}

impl fmt::Debug for ExtractedFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractedFields")
            .field("host", &self.host)
            .field("source", &self.source)
            .field("sourcetype", &self.sourcetype)
            .field("index", &self.index)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("fields", &self.fields)
            .finish()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReservedFieldExtractor {
    keys: ReservedKeys,
}

impl ReservedFieldExtractor {
    pub fn new(keys: ReservedKeys) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &ReservedKeys {
        &self.keys
    }

    pub fn extract(&self, attributes: &Attributes) -> ExtractedFields {
        self.extract_layered([attributes])
    }

    /// Applies attribute sets in order; for every key the last value wins.
    pub fn extract_layered<'a>(
        &self,
        layers: impl IntoIterator<Item = &'a Attributes>,
    ) -> ExtractedFields {
        let mut extracted = ExtractedFields::default();
        for attributes in layers {
            for (key, value) in attributes.iter() {
                self.apply(&mut extracted, key, value);
            }
        }
        extracted
    }

    fn apply(&self, extracted: &mut ExtractedFields, key: &str, value: &AttributeValue) {
        let keys = &self.keys;
        let rendered = value.as_display_string();

        if key == keys.token {
            extracted.token = Some(rendered);
        } else if key == keys.host {
            extracted.host = rendered;
        } else if key == keys.source {
            extracted.source = rendered;
        } else if key == keys.sourcetype {
            extracted.sourcetype = rendered;
        } else if key == keys.index {
            extracted.index = rendered;
        } else {
            extracted
                .fields
                .insert(key.to_string(), JsonValue::String(rendered));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttributeValue;

    fn attrs(pairs: &[(&str, AttributeValue)]) -> Attributes {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn reserved_keys_are_consumed() {
        let extractor = ReservedFieldExtractor::default();
        let extracted = extractor.extract(&attrs(&[
            (HOST_NAME_KEY, "myhost".into()),
            (SOURCE_KEY, "otel".into()),
            (SOURCETYPE_KEY, "st-otel".into()),
            (INDEX_KEY, "main".into()),
            (HEC_TOKEN_KEY, "secret-token".into()),
            ("custom", "custom".into()),
        ]));

        assert_eq!(extracted.host, "myhost");
        assert_eq!(extracted.source, "otel");
        assert_eq!(extracted.sourcetype, "st-otel");
        assert_eq!(extracted.index, "main");
        assert_eq!(extracted.token.as_deref(), Some("secret-token"));
        assert_eq!(extracted.fields.len(), 1);
        assert_eq!(extracted.fields["custom"], "custom");
    }

    #[test]
    fn residual_never_contains_reserved_keys() {
        let extractor = ReservedFieldExtractor::default();
        let extracted = extractor.extract_layered([
            &attrs(&[(HEC_TOKEN_KEY, "a".into()), (INDEX_KEY, "i1".into())]),
            &attrs(&[(HEC_TOKEN_KEY, "b".into()), ("k", "v".into())]),
        ]);

        for key in [HOST_NAME_KEY, SOURCE_KEY, SOURCETYPE_KEY, INDEX_KEY, HEC_TOKEN_KEY] {
            assert!(!extracted.fields.contains_key(key), "{key} leaked");
        }
        assert!(!format!("{extracted:?}").contains("\"b\""));
    }

    #[test]
    fn host_defaults_to_unknown() {
        let extracted = ReservedFieldExtractor::default().extract(&Attributes::new());
        assert_eq!(extracted.host, UNKNOWN_HOST);
        assert!(extracted.source.is_empty());
        assert!(extracted.token.is_none());
        assert!(extracted.fields.is_empty());
    }

    #[test]
    fn later_layers_win() {
        let extracted = ReservedFieldExtractor::default().extract_layered([
            &attrs(&[(SOURCE_KEY, "resource".into()), ("env", "dev".into())]),
            &attrs(&[(SOURCE_KEY, "record".into()), ("env", "prod".into())]),
        ]);
        assert_eq!(extracted.source, "record");
        assert_eq!(extracted.fields["env"], "prod");
    }

    #[test]
    fn non_string_values_use_display_form() {
        let extracted = ReservedFieldExtractor::default().extract(&attrs(&[
            ("int", AttributeValue::Int(7)),
            ("bool", AttributeValue::Bool(true)),
            ("double", AttributeValue::Double(0.25)),
            ("list", AttributeValue::Array(vec!["a".into(), "b".into()])),
            (HOST_NAME_KEY, AttributeValue::Int(42)),
        ]));
        assert_eq!(extracted.fields["int"], "7");
        assert_eq!(extracted.fields["bool"], "true");
        assert_eq!(extracted.fields["double"], "0.25");
        assert_eq!(extracted.fields["list"], r#"["a","b"]"#);
        assert_eq!(extracted.host, "42");
    }

    #[test]
    fn keys_are_matched_literally() {
        let extracted = ReservedFieldExtractor::default()
            .extract(&attrs(&[("Com.Splunk.Index", "upper".into())]));
        assert!(extracted.index.is_empty());
        assert_eq!(extracted.fields["Com.Splunk.Index"], "upper");
    }

    #[test]
    fn custom_keys() {
        let extractor = ReservedFieldExtractor::new(ReservedKeys {
            index: "splunk.index".to_string(),
            ..ReservedKeys::default()
        });
        let extracted = extractor.extract(&attrs(&[
            ("splunk.index", "custom".into()),
            (INDEX_KEY, "default-key".into()),
        ]));
        assert_eq!(extracted.index, "custom");
        assert_eq!(extracted.fields[INDEX_KEY], "default-key");
    }
}
