//! PII policy engine
//!
//! A pluggable per-field rule set applied to event content before it is
//! persisted. Rules are declarative so the policy can be audited and
//! adjusted per project without touching ingest code.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// What to do with a field matched by a [`PiiRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiAction {
    PassThrough,
    Truncate,
    Hash,
    Tokenize,
    Redact,
}

/// A single detector + action pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiRule {
    pub label: &'static str,
    pub action: PiiAction,
}

fn email_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap()
    })
}

fn secret_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(api[_-]?key|secret|token|password)\s*[:=]\s*\S+").unwrap()
    })
}

fn long_digits_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{9,}\b").unwrap())
}

fn pattern_for(label: &str) -> Option<&'static Regex> {
    match label {
        "email" => Some(email_pattern()),
        "secret" => Some(secret_pattern()),
        "long_digits" => Some(long_digits_pattern()),
        _ => None,
    }
}

/// Applies a profile's rule set to free text, returning the transformed
/// text and the labels of rules that fired.
pub struct PiiPolicy {
    rules: Vec<PiiRule>,
}

impl PiiPolicy {
    /// Balanced default: hash emails, redact things that look like secrets,
    /// truncate long numeric sequences (card-like), pass through the rest.
    pub fn balanced() -> Self {
        Self {
            rules: vec![
                PiiRule { label: "email", action: PiiAction::Hash },
                PiiRule { label: "secret", action: PiiAction::Redact },
                PiiRule { label: "long_digits", action: PiiAction::Truncate },
            ],
        }
    }

    /// Strict profile: redact everything a balanced policy would only hash
    /// or truncate.
    pub fn strict() -> Self {
        Self {
            rules: vec![
                PiiRule { label: "email", action: PiiAction::Redact },
                PiiRule { label: "secret", action: PiiAction::Redact },
                PiiRule { label: "long_digits", action: PiiAction::Redact },
            ],
        }
    }

    /// Permissive profile: everything passes through untouched.
    pub fn permissive() -> Self {
        Self { rules: vec![] }
    }

    /// Build a policy from a [`config::PiiPolicyProfile`](crate::config::PiiPolicyProfile).
    pub fn from_profile(profile: crate::config::PiiPolicyProfile) -> Self {
        use crate::config::PiiPolicyProfile::*;
        match profile {
            Permissive => Self::permissive(),
            Balanced => Self::balanced(),
            Strict => Self::strict(),
        }
    }

    /// Apply every configured rule to `text`, returning the transformed
    /// text and the labels that matched.
    pub fn apply(&self, text: &str) -> (String, Vec<&'static str>) {
        let mut out = text.to_string();
        let mut fired = Vec::new();

        for rule in &self.rules {
            let Some(pattern) = pattern_for(rule.label) else {
                continue;
            };
            if !pattern.is_match(&out) {
                continue;
            }
            fired.push(rule.label);
            out = match rule.action {
                PiiAction::PassThrough => out,
                PiiAction::Truncate => pattern
                    .replace_all(&out, |caps: &Captures| {
                        let m = &caps[0];
                        format!("{}…", &m[..m.len().min(4)])
                    })
                    .into_owned(),
                PiiAction::Hash => pattern
                    .replace_all(&out, |caps: &Captures| hash_token(&caps[0]))
                    .into_owned(),
                PiiAction::Tokenize => pattern
                    .replace_all(&out, |caps: &Captures| {
                        format!("[{}:{}]", rule.label, &hash_token(&caps[0])[..8])
                    })
                    .into_owned(),
                PiiAction::Redact => pattern.replace_all(&out, "[REDACTED]").into_owned(),
            };
        }

        (out, fired)
    }
}

fn hash_token(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
