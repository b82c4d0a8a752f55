//! HTML views
//!
//! Three views (index, delete confirmation, login) and the stylesheet they
//! inline. Everything is read and compiled once at startup; a missing or
//! broken asset is a startup error.

use std::collections::BTreeMap;
use std::path::PathBuf;

use minijinja::{AutoEscape, Environment, Value};
use serde::Serialize;
use thiserror::Error;

use tunnelgate_core::Tunnel;

const STYLES_FILE: &str = "styles.css";

/// (template name, asset file)
const VIEWS: [(&str, &str); 3] = [
    ("index", "index.tmpl"),
    ("confirm", "confirm.tmpl"),
    ("login", "login.tmpl"),
];

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Failed to read asset {name}: {source}")]
    Read {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to compile template {name}: {source}")]
    Compile {
        name: &'static str,
        #[source]
        source: minijinja::Error,
    },
}

/// Where views and the stylesheet come from
#[derive(Debug, Clone)]
pub enum AssetSource {
    /// Compiled into the binary
    Bundled,
    /// Files of the same names in a directory
    Directory(PathBuf),
}

impl AssetSource {
    fn read(&self, name: &'static str) -> Result<String, TemplateError> {
        match self {
            AssetSource::Bundled => Ok(bundled(name).to_string()),
            AssetSource::Directory(dir) => std::fs::read_to_string(dir.join(name))
                .map_err(|source| TemplateError::Read { name, source }),
        }
    }
}

fn bundled(name: &str) -> &'static str {
    match name {
        STYLES_FILE => include_str!("../assets/styles.css"),
        "index.tmpl" => include_str!("../assets/index.tmpl"),
        "confirm.tmpl" => include_str!("../assets/confirm.tmpl"),
        "login.tmpl" => include_str!("../assets/login.tmpl"),
        _ => "",
    }
}

#[derive(Serialize)]
struct IndexData {
    styles: Value,
    tunnels: BTreeMap<String, TunnelRow>,
}

#[derive(Serialize)]
struct TunnelRow {
    client_name: String,
    client_port: u16,
    tunnel_port: u16,
    delete_url: Value,
}

#[derive(Serialize)]
struct ConfirmData {
    styles: Value,
    message: String,
    confirm_url: Value,
    cancel_url: Value,
}

#[derive(Serialize)]
struct LoginData {
    styles: Value,
}

/// Compiled views, shared read-only by every request
pub struct Templates {
    env: Environment<'static>,
    styles: String,
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templates")
            .field("views", &VIEWS.map(|(name, _)| name))
            .finish_non_exhaustive()
    }
}

impl Templates {
    pub fn load(source: &AssetSource) -> Result<Self, TemplateError> {
        let styles = source.read(STYLES_FILE)?;

        let mut env = Environment::new();
        // Asset names end in .tmpl, so escaping has to be forced on
        env.set_auto_escape_callback(|_| AutoEscape::Html);

        for (name, file) in VIEWS {
            let text = source.read(file)?;
            env.add_template_owned(name, text)
                .map_err(|source| TemplateError::Compile { name, source })?;
        }

        tracing::debug!(?source, "Templates loaded");
        Ok(Self { env, styles })
    }

    pub fn render_index(&self, tunnels: &BTreeMap<String, Tunnel>) -> Result<String, minijinja::Error> {
        let tunnels = tunnels
            .iter()
            .map(|(domain, tunnel)| {
                let row = TunnelRow {
                    client_name: tunnel.client_name.clone(),
                    client_port: tunnel.client_port,
                    tunnel_port: tunnel.tunnel_port,
                    delete_url: Value::from_safe_string(url_with_domain(
                        "/confirm-delete-tunnel",
                        domain,
                    )),
                };
                (domain.clone(), row)
            })
            .collect();

        self.render(
            "index",
            IndexData {
                styles: self.styles_value(),
                tunnels,
            },
        )
    }

    /// `confirm_url` and `cancel_url` are inserted unescaped; build them
    /// with [`url_with_domain`].
    pub fn render_confirm(
        &self,
        message: &str,
        confirm_url: &str,
        cancel_url: &str,
    ) -> Result<String, minijinja::Error> {
        self.render(
            "confirm",
            ConfirmData {
                styles: self.styles_value(),
                message: message.to_string(),
                confirm_url: Value::from_safe_string(confirm_url.to_string()),
                cancel_url: Value::from_safe_string(cancel_url.to_string()),
            },
        )
    }

    pub fn render_login(&self) -> Result<String, minijinja::Error> {
        self.render(
            "login",
            LoginData {
                styles: self.styles_value(),
            },
        )
    }

    fn render<S: Serialize>(&self, name: &str, data: S) -> Result<String, minijinja::Error> {
        self.env.get_template(name)?.render(data)
    }

    fn styles_value(&self) -> Value {
        Value::from_safe_string(self.styles.clone())
    }
}

/// `path?domain=<domain>` with the domain form-urlencoded, so the value
/// decodes back to exactly what was given and needs no HTML escaping.
pub fn url_with_domain(path: &str, domain: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("domain", domain)
        .finish();
    format!("{path}?{query}")
}
