//! Sign-in provider registry.
//!
//! Builds, once at startup, the list of enabled OAuth providers with their
//! credentials checked. Disabled or unconfigured providers are left out.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Raw `[providers.<name>]` table. Which fields are required depends on the
/// provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
  pub enabled:              bool,
  pub client_id:            Option<String>,
  pub client_secret:        Option<String>,
  pub consumer_key:         Option<String>,
  pub consumer_secret:      Option<String>,
  pub team_id:              Option<String>,
  pub key_id:               Option<String>,
  pub private_key:          Option<String>,
  pub tenant:               Option<String>,
  pub base_url:             Option<String>,
  pub default_domain:       Option<String>,
  pub default_organization: Option<String>,
  pub default_connection:   Option<String>,
  /// Comma-separated.
  pub scope:                Option<String>,
  /// Comma-separated.
  pub profile_fields:       Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
  #[error("unknown sign-in provider {0:?}")]
  UnknownProvider(String),

  #[error("provider {provider} is enabled but `{field}` is not set")]
  MissingCredential {
    provider: &'static str,
    field:    &'static str,
  },
}

// ─── Providers ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProviderKind {
  Github,
  Google,
  Facebook,
  Twitter,
  Linkedin,
  Apple,
  WindowsLive,
  Spotify,
  Gitlab,
  Bitbucket,
  Strava,
  Discord,
  Twitch,
  Workos,
  AzureAd,
}

impl ProviderKind {
  pub const ALL: [Self; 15] = [
    Self::Github,
    Self::Google,
    Self::Facebook,
    Self::Twitter,
    Self::Linkedin,
    Self::Apple,
    Self::WindowsLive,
    Self::Spotify,
    Self::Gitlab,
    Self::Bitbucket,
    Self::Strava,
    Self::Discord,
    Self::Twitch,
    Self::Workos,
    Self::AzureAd,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Github => "github",
      Self::Google => "google",
      Self::Facebook => "facebook",
      Self::Twitter => "twitter",
      Self::Linkedin => "linkedin",
      Self::Apple => "apple",
      Self::WindowsLive => "windowslive",
      Self::Spotify => "spotify",
      Self::Gitlab => "gitlab",
      Self::Bitbucket => "bitbucket",
      Self::Strava => "strava",
      Self::Discord => "discord",
      Self::Twitch => "twitch",
      Self::Workos => "workos",
      Self::AzureAd => "azuread",
    }
  }

  pub fn parse(name: &str) -> Option<Self> { Self::ALL.into_iter().find(|k| k.as_str() == name) }

  fn default_scope(self) -> &'static [&'static str] {
    match self {
      Self::Github => &["user:email"],
      Self::Google => &["email", "profile"],
      Self::Facebook => &["email"],
      Self::Linkedin => &["r_emailaddress", "r_liteprofile"],
      Self::Apple => &["name", "email"],
      Self::WindowsLive => &["wl.basic", "wl.emails"],
      Self::Spotify => &["user-read-email", "user-read-private"],
      Self::Gitlab => &["read_user"],
      Self::Strava => &["profile:read_all"],
      Self::Discord => &["identify", "email"],
      Self::Twitch => &["user:read:email"],
      Self::Twitter | Self::Bitbucket | Self::Workos | Self::AzureAd => &[],
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
  OAuth2 {
    client_id:     String,
    client_secret: String,
  },
  /// Twitter still signs requests with OAuth 1.0a consumer keys.
  OAuth1 {
    consumer_key:    String,
    consumer_secret: String,
  },
  /// Sign in with Apple authenticates with a signed JWT, not a secret.
  Apple {
    client_id:   String,
    team_id:     String,
    key_id:      String,
    private_key: String,
  },
}

/// A provider that is enabled and has every credential it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnabledProvider {
  pub kind:           ProviderKind,
  pub credentials:    Credentials,
  pub scope:          Vec<String>,
  /// Facebook only.
  pub profile_fields: Vec<String>,
  /// Provider-specific options such as `tenant` or `base_url`.
  pub options:        BTreeMap<&'static str, String>,
}

/// Validate the configured providers and return the enabled ones, ordered by
/// name.
pub fn enabled_providers(
  settings: &BTreeMap<String, ProviderSettings>,
) -> Result<Vec<EnabledProvider>, ProviderError> {
  let mut enabled = Vec::new();
  for (name, cfg) in settings {
    let kind = ProviderKind::parse(name).ok_or_else(|| ProviderError::UnknownProvider(name.clone()))?;
    if cfg.enabled {
      enabled.push(build(kind, cfg)?);
    }
  }
  Ok(enabled)
}

fn build(kind: ProviderKind, cfg: &ProviderSettings) -> Result<EnabledProvider, ProviderError> {
  let need = |value: &Option<String>, field: &'static str| {
    value
      .as_deref()
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .map(str::to_owned)
      .ok_or(ProviderError::MissingCredential { provider: kind.as_str(), field })
  };

  let credentials = match kind {
    ProviderKind::Twitter => Credentials::OAuth1 {
      consumer_key:    need(&cfg.consumer_key, "consumer_key")?,
      consumer_secret: need(&cfg.consumer_secret, "consumer_secret")?,
    },
    ProviderKind::Apple => Credentials::Apple {
      client_id:   need(&cfg.client_id, "client_id")?,
      team_id:     need(&cfg.team_id, "team_id")?,
      key_id:      need(&cfg.key_id, "key_id")?,
      private_key: need(&cfg.private_key, "private_key")?.replace("\\n", "\n"),
    },
    _ => Credentials::OAuth2 {
      client_id:     need(&cfg.client_id, "client_id")?,
      client_secret: need(&cfg.client_secret, "client_secret")?,
    },
  };

  let mut options = BTreeMap::new();
  match kind {
    ProviderKind::AzureAd => {
      options.insert("tenant", need(&cfg.tenant, "tenant")?);
    }
    ProviderKind::Gitlab => {
      if let Some(base_url) = &cfg.base_url {
        options.insert("base_url", base_url.clone());
      }
    }
    ProviderKind::Workos => {
      for (key, value) in [
        ("default_domain", &cfg.default_domain),
        ("default_organization", &cfg.default_organization),
        ("default_connection", &cfg.default_connection),
      ] {
        if let Some(value) = value {
          options.insert(key, value.clone());
        }
      }
    }
    _ => {}
  }

  let profile_fields = match kind {
    ProviderKind::Facebook => list_or(&cfg.profile_fields, &["email", "photos", "displayName"]),
    _ => Vec::new(),
  };

  Ok(EnabledProvider {
    kind,
    credentials,
    scope: list_or(&cfg.scope, kind.default_scope()),
    profile_fields,
    options,
  })
}

/// Split a comma-separated setting, falling back to `default` when unset.
fn list_or(value: &Option<String>, default: &[&str]) -> Vec<String> {
  match value {
    Some(v) => v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect(),
    None => default.iter().map(|s| (*s).to_owned()).collect(),
  }
}
