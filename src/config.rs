//! Bootstrap configuration: the modular-input XML document read from stdin.

use std::io::Read;
use tracing::warn;

use crate::error::ConfigError;

pub const DEFAULT_GRPC_PORT: u16 = 4317;
pub const DEFAULT_HTTP_PORT: u16 = 4318;
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// `name` attribute of the stanza, e.g. `otlpinput://main`.
    pub stanza_name: Option<String>,
    pub app: Option<String>,
    /// Every `<param>` in document order, including ones not interpreted here.
    pub params: Vec<(String, String)>,
    /// Raw `format` parameter; `None` when the parameter is absent.
    pub format: Option<String>,
    pub grpc_port: u16,
    pub http_port: u16,
    pub listen_address: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            stanza_name: None,
            app: None,
            params: Vec::new(),
            format: None,
            grpc_port: DEFAULT_GRPC_PORT,
            http_port: DEFAULT_HTTP_PORT,
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
        }
    }
}

impl BootstrapConfig {
    pub fn read_from(mut reader: impl Read) -> Result<Self, ConfigError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::from_xml(&text)
    }

    /// Parses `<input><configuration><stanza>` documents. Only the first
    /// stanza is used; a document without one yields the defaults.
    pub fn from_xml(text: &str) -> Result<Self, ConfigError> {
        let doc = roxmltree::Document::parse(text.trim_start())?;
        let root = doc.root_element();
        if !root.has_tag_name("input") {
            return Err(ConfigError::UnexpectedRoot(root.tag_name().name().to_string()));
        }

        let mut config = Self::default();
        let Some(stanza) = root
            .children()
            .find(|n| n.has_tag_name("configuration"))
            .and_then(|c| c.children().find(|n| n.has_tag_name("stanza")))
        else {
            return Ok(config);
        };

        config.stanza_name = stanza.attribute("name").map(str::to_string);
        config.app = stanza.attribute("app").map(str::to_string);

        for param in stanza.children().filter(|n| n.has_tag_name("param")) {
            let name = param.attribute("name").unwrap_or_default();
            let value = param.text().unwrap_or_default();
            match name {
                "format" => config.format = Some(value.to_string()),
                "grpc_port" => config.grpc_port = parse_port(name, value, DEFAULT_GRPC_PORT),
                "http_port" => config.http_port = parse_port(name, value, DEFAULT_HTTP_PORT),
                "listen_address" => config.listen_address = value.trim().to_string(),
                _ => {}
            }
            config.params.push((name.to_string(), value.to_string()));
        }

        Ok(config)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn grpc_endpoint(&self) -> String {
        self.endpoint(self.grpc_port)
    }

    pub fn http_endpoint(&self) -> String {
        self.endpoint(self.http_port)
    }

    fn endpoint(&self, port: u16) -> String {
        if self.listen_address.contains(':') {
            format!("[{}]:{}", self.listen_address, port)
        } else {
            format!("{}:{}", self.listen_address, port)
        }
    }
}

fn parse_port(name: &str, value: &str, default: u16) -> u16 {
    value.trim().parse().unwrap_or_else(|_| {
        warn!(param = name, value, default, "invalid port, using default");
        default
    })
}
