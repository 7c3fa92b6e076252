//! Remote service specifications.
//!
//! A [`RemoteSpec`] carries everything needed to reach one remote service:
//! artifact index, artifact storage, or a remote-execution endpoint. The
//! engine treats these as opaque capabilities handed to components that
//! need them; certificate files are loaded lazily on first use and a
//! transport descriptor is derived from the URL scheme.

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use url::Url;

/// The role a remote plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoteKind {
  /// Artifact index service.
  Index,
  /// Artifact storage service.
  Storage,
  /// Remote-execution endpoint.
  Endpoint,
  /// Both index and storage.
  #[default]
  All,
}

impl RemoteKind {
  fn parse(value: &str) -> Option<Self> {
    match value {
      "index" => Some(Self::Index),
      "storage" => Some(Self::Storage),
      "endpoint" => Some(Self::Endpoint),
      "all" => Some(Self::All),
      _ => None,
    }
  }
}

impl std::fmt::Display for RemoteKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let label = match self {
      RemoteKind::Index => "index",
      RemoteKind::Storage => "storage",
      RemoteKind::Endpoint => "endpoint",
      RemoteKind::All => "all",
    };
    write!(f, "{label}")
  }
}

/// Certificate material loaded from disk.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Credentials {
  pub server_cert: Option<Vec<u8>>,
  pub client_key: Option<Vec<u8>>,
  pub client_cert: Option<Vec<u8>>,
}

/// Transport selected by the remote's URL scheme.
#[derive(Debug, Clone)]
pub enum Transport {
  Plaintext,
  Tls(Rc<Credentials>),
}

/// A ready-to-dial channel description.
#[derive(Debug, Clone)]
pub struct ChannelSpec {
  /// `host:port` of the service.
  pub endpoint: String,
  pub transport: Transport,
  pub instance_name: Option<String>,
}

/// Errors raised while parsing or using a remote specification.
#[derive(Debug, Error)]
pub enum RemoteError {
  #[error("{provenance}: {reason}")]
  Malformed { provenance: String, reason: String },

  #[error("{provenance}: empty remote URL")]
  EmptyUrl { provenance: String },

  #[error("{provenance}: unknown remote type '{kind}'")]
  UnknownKind { provenance: String, kind: String },

  #[error("{provenance}: 'client-key' was specified without 'client-cert'")]
  MissingClientCert { provenance: String },

  #[error("{provenance}: 'client-cert' was specified without 'client-key'")]
  MissingClientKey { provenance: String },

  #[error("{provenance}: failed to load credentials file '{path}': {source}")]
  Credentials {
    provenance: String,
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("{provenance}: invalid URL '{url}': {source}")]
  InvalidUrl {
    provenance: String,
    url: String,
    #[source]
    source: url::ParseError,
  },

  #[error("{provenance}: remote execution endpoints must specify an explicit port, e.g. http://buildservice:50051")]
  MissingPort { provenance: String },

  #[error("{provenance}: only 'http' and 'https' are supported, but '{scheme}' was supplied")]
  UnsupportedScheme { provenance: String, scheme: String },
}

/// Specification of one remote service.
#[derive(Debug)]
pub struct RemoteSpec {
  kind: RemoteKind,
  url: String,
  push: bool,
  instance_name: Option<String>,
  server_cert_file: Option<PathBuf>,
  client_key_file: Option<PathBuf>,
  client_cert_file: Option<PathBuf>,
  /// Where this spec was declared, for error reporting.
  provenance: String,
  credentials: RefCell<Option<Rc<Credentials>>>,
}

impl RemoteSpec {
  /// Parse a spec from its configuration mapping.
  ///
  /// Certificate paths are resolved against `basedir`. In
  /// `remote_execution` mode the `type` and `push` keys are invalid and the
  /// kind is forced to [`RemoteKind::Endpoint`].
  pub fn from_node(
    node: &serde_yaml::Mapping,
    basedir: Option<&Path>,
    remote_execution: bool,
    provenance: &str,
  ) -> Result<Self, RemoteError> {
    let mut valid_keys = vec!["url", "server-cert", "client-key", "client-cert", "instance-name"];

    let (kind, push) = if remote_execution {
      (RemoteKind::Endpoint, false)
    } else {
      valid_keys.extend(["push", "type"]);
      let kind = match node.get("type").and_then(serde_yaml::Value::as_str) {
        None => RemoteKind::All,
        Some(raw) => RemoteKind::parse(raw).ok_or_else(|| RemoteError::UnknownKind {
          provenance: provenance.to_string(),
          kind: raw.to_string(),
        })?,
      };
      let push = node.get("push").and_then(serde_yaml::Value::as_bool).unwrap_or(false);
      (kind, push)
    };

    for key in node.keys() {
      let key = key.as_str().unwrap_or_default();
      if !valid_keys.contains(&key) {
        return Err(RemoteError::Malformed {
          provenance: provenance.to_string(),
          reason: format!("unexpected key '{key}'"),
        });
      }
    }

    let url = node
      .get("url")
      .and_then(serde_yaml::Value::as_str)
      .unwrap_or_default()
      .to_string();
    if url.is_empty() {
      return Err(RemoteError::EmptyUrl {
        provenance: provenance.to_string(),
      });
    }

    let cert_path = |key: &str| -> Option<PathBuf> {
      let raw = node.get(key).and_then(serde_yaml::Value::as_str)?;
      let expanded = expand_home(raw);
      match (basedir, expanded.is_absolute()) {
        (Some(base), false) => Some(base.join(expanded)),
        _ => Some(expanded),
      }
    };

    let server_cert_file = cert_path("server-cert");
    let client_key_file = cert_path("client-key");
    let client_cert_file = cert_path("client-cert");

    if client_key_file.is_some() && client_cert_file.is_none() {
      return Err(RemoteError::MissingClientCert {
        provenance: provenance.to_string(),
      });
    }
    if client_cert_file.is_some() && client_key_file.is_none() {
      return Err(RemoteError::MissingClientKey {
        provenance: provenance.to_string(),
      });
    }

    Ok(Self {
      kind,
      url,
      push,
      instance_name: node
        .get("instance-name")
        .and_then(serde_yaml::Value::as_str)
        .map(str::to_string),
      server_cert_file,
      client_key_file,
      client_cert_file,
      provenance: provenance.to_string(),
      credentials: RefCell::new(None),
    })
  }

  pub fn kind(&self) -> RemoteKind {
    self.kind
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  pub fn push(&self) -> bool {
    self.push
  }

  pub fn instance_name(&self) -> Option<&str> {
    self.instance_name.as_deref()
  }

  pub fn provenance(&self) -> &str {
    &self.provenance
  }

  /// Certificate material for this remote, loaded from disk on first call
  /// and cached for the life of the spec.
  pub fn credentials(&self) -> Result<Rc<Credentials>, RemoteError> {
    if let Some(loaded) = self.credentials.borrow().as_ref() {
      return Ok(Rc::clone(loaded));
    }

    let read = |file: &Option<PathBuf>| -> Result<Option<Vec<u8>>, RemoteError> {
      match file {
        None => Ok(None),
        Some(path) => fs::read(path).map(Some).map_err(|e| RemoteError::Credentials {
          provenance: self.provenance.clone(),
          path: path.display().to_string(),
          source: e,
        }),
      }
    };

    let loaded = Rc::new(Credentials {
      server_cert: read(&self.server_cert_file)?,
      client_key: read(&self.client_key_file)?,
      client_cert: read(&self.client_cert_file)?,
    });
    *self.credentials.borrow_mut() = Some(Rc::clone(&loaded));
    Ok(loaded)
  }

  /// Derive the channel description for this remote.
  ///
  /// Remote-execution endpoints must carry an explicit port; the transport
  /// follows the URL scheme (plaintext for `http`, TLS for `https`).
  pub fn open_channel(&self) -> Result<ChannelSpec, RemoteError> {
    let url = Url::parse(&self.url).map_err(|e| RemoteError::InvalidUrl {
      provenance: self.provenance.clone(),
      url: self.url.clone(),
      source: e,
    })?;

    if self.kind == RemoteKind::Endpoint && url.port().is_none() {
      return Err(RemoteError::MissingPort {
        provenance: self.provenance.clone(),
      });
    }

    let host = url.host_str().unwrap_or_default();
    let (transport, default_port) = match url.scheme() {
      "http" => (Transport::Plaintext, 80),
      "https" => (Transport::Tls(self.credentials()?), 443),
      scheme => {
        return Err(RemoteError::UnsupportedScheme {
          provenance: self.provenance.clone(),
          scheme: scheme.to_string(),
        });
      }
    };

    Ok(ChannelSpec {
      endpoint: format!("{}:{}", host, url.port().unwrap_or(default_port)),
      transport,
      instance_name: self.instance_name.clone(),
    })
  }
}

/// Specification of a remote-execution cluster: the execution service, the
/// storage service it shares data with, and an optional action cache.
#[derive(Debug)]
pub struct RemoteExecutionSpec {
  pub execution: RemoteSpec,
  pub storage: RemoteSpec,
  pub action_cache: Option<RemoteSpec>,
}

impl RemoteExecutionSpec {
  pub fn from_node(
    node: &serde_yaml::Mapping,
    basedir: Option<&Path>,
    provenance: &str,
  ) -> Result<Self, RemoteError> {
    const VALID_KEYS: &[&str] = &["execution-service", "storage-service", "action-cache-service"];
    for key in node.keys() {
      let key = key.as_str().unwrap_or_default();
      if !VALID_KEYS.contains(&key) {
        return Err(RemoteError::Malformed {
          provenance: provenance.to_string(),
          reason: format!("unexpected key '{key}'"),
        });
      }
    }

    let service = |key: &str| -> Result<Option<RemoteSpec>, RemoteError> {
      match node.get(key) {
        None => Ok(None),
        Some(value) => {
          let mapping = value.as_mapping().ok_or_else(|| RemoteError::Malformed {
            provenance: provenance.to_string(),
            reason: format!("'{key}' must be a mapping"),
          })?;
          let sub = format!("{provenance} [{key}]");
          RemoteSpec::from_node(mapping, basedir, true, &sub).map(Some)
        }
      }
    };

    let execution = service("execution-service")?.ok_or_else(|| RemoteError::Malformed {
      provenance: provenance.to_string(),
      reason: "missing 'execution-service'".to_string(),
    })?;
    let storage = service("storage-service")?.ok_or_else(|| RemoteError::Malformed {
      provenance: provenance.to_string(),
      reason: "missing 'storage-service'".to_string(),
    })?;
    let action_cache = service("action-cache-service")?;

    Ok(Self {
      execution,
      storage,
      action_cache,
    })
  }
}

fn expand_home(raw: &str) -> PathBuf {
  if let Some(rest) = raw.strip_prefix("~/") {
    if let Some(home) = dirs::home_dir() {
      return home.join(rest);
    }
  }
  PathBuf::from(raw)
}
