//! `ATLANTIS_*` environment variable loading.

use super::{AuthConfig, ConfigError, ProviderConfig, ProviderType, duration};

const DEFAULT_SECRET: &str = "change-me-in-production";
const DEFAULT_BASIC_USER: &str = "atlantis";
const DEFAULT_BASIC_PASS: &str = "atlantis";

/// Read the process environment.
pub fn load() -> Result<AuthConfig, ConfigError> {
    load_with(|key| std::env::var(key).ok())
}

/// Build a config from an arbitrary variable lookup.
pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<AuthConfig, ConfigError> {
    let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
    let flag = |key: &str, default: bool| parse_bool(lookup(key).as_deref(), default);
    let list = |key: &str| lookup(key).map(|v| split_list(&v));

    let mut config = AuthConfig {
        session_secret: var("ATLANTIS_SESSION_SECRET", DEFAULT_SECRET),
        secure_cookies: flag("ATLANTIS_SECURE_COOKIES", false),
        csrf_secret: var("ATLANTIS_CSRF_SECRET", DEFAULT_SECRET),
        enable_basic_auth: flag("ATLANTIS_ENABLE_BASIC_AUTH", false),
        basic_auth_user: var("ATLANTIS_BASIC_AUTH_USER", DEFAULT_BASIC_USER),
        basic_auth_pass: var("ATLANTIS_BASIC_AUTH_PASS", DEFAULT_BASIC_PASS),
        ..AuthConfig::default()
    };

    if let Some(raw) = lookup("ATLANTIS_SESSION_DURATION") {
        config.session_duration = duration::parse(&raw)?;
    }
    if let Some(name) = lookup("ATLANTIS_SESSION_COOKIE_NAME") {
        config.session_cookie_name = name;
    }
    if let Some(roles) = list("ATLANTIS_DEFAULT_ROLES") {
        config.default_roles = roles;
    }
    if let Some(groups) = list("ATLANTIS_ADMIN_GROUPS") {
        config.admin_groups = groups;
    }
    if let Some(emails) = list("ATLANTIS_ADMIN_EMAILS") {
        config.admin_emails = emails;
    }

    // Well-known providers, in a fixed order. A provider is configured when
    // its client id is set.
    if let Some(p) = base_provider(&lookup, "GOOGLE", "google", "Google", ProviderType::OAuth2) {
        config.providers.push(p);
    }
    if let Some(mut p) = base_provider(&lookup, "OKTA", "okta", "Okta", ProviderType::Oidc) {
        p.issuer_url = required(&lookup, "ATLANTIS_OKTA_ISSUER_URL")?;
        config.providers.push(p);
    }
    if let Some(mut p) = base_provider(&lookup, "AZURE", "azure", "Azure AD", ProviderType::Oidc) {
        let tenant = required(&lookup, "ATLANTIS_AZURE_TENANT_ID")?;
        p.issuer_url = format!("https://login.microsoftonline.com/{tenant}");
        config.providers.push(p);
    }
    if let Some(mut p) = base_provider(&lookup, "AUTH0", "auth0", "Auth0", ProviderType::Oidc) {
        let domain = required(&lookup, "ATLANTIS_AUTH0_DOMAIN")?;
        p.issuer_url = format!("https://{domain}");
        config.providers.push(p);
    }

    Ok(config)
}

fn base_provider(
    lookup: &impl Fn(&str) -> Option<String>,
    prefix: &str,
    id: &str,
    name: &str,
    provider_type: ProviderType,
) -> Option<ProviderConfig> {
    let client_id = lookup(&format!("ATLANTIS_{prefix}_CLIENT_ID")).filter(|v| !v.is_empty())?;
    Some(ProviderConfig {
        provider_type,
        id: id.to_string(),
        name: name.to_string(),
        client_id,
        client_secret: lookup(&format!("ATLANTIS_{prefix}_CLIENT_SECRET")).unwrap_or_default(),
        redirect_url: lookup(&format!("ATLANTIS_{prefix}_REDIRECT_URL")).unwrap_or_default(),
        ..ProviderConfig::default()
    })
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    lookup(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1" | "yes") => true,
        Some("false" | "0" | "no") => false,
        _ => default,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
