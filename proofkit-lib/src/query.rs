//! Proof queries and their validation boundary.
//!
//! A query is a closed tagged union: exactly one variant is active and every
//! consumption site matches exhaustively. Externally supplied options
//! objects never become a `Query` without passing [`Query::from_options`],
//! which rejects unrecognized tags and malformed fields before any crypto
//! or IO happens.

use serde::{Deserialize, Serialize};

use crate::errors::ProofkitError;
use crate::wire::MAX_TIMESTAMP;
use crate::Result;

/// What a requester is asking the holder device for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Query {
    /// The raw passport data groups.
    RawPassport,
    /// The private inputs needed to build a proof requester-side.
    ProofInputs(QueryConstraints),
    /// A finished proof built on the holder device.
    Proof(QueryConstraints),
    /// Free-text marker, used by tests and diagnostics.
    Dummy { marker: String },
}

/// Constraints a proof (or its inputs) must satisfy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConstraints {
    /// Minimum age the document holder must prove.
    pub min_age: Option<u8>,
    /// Three-letter (alpha-3) nationality code the document must carry.
    pub nationality: Option<String>,
    /// Application id the proof is scoped to.
    pub app_id: Option<String>,
    /// Timestamp the proof is anchored at, milliseconds.
    pub timestamp: Option<u64>,
}

impl QueryConstraints {
    fn validate(&self) -> Result<()> {
        if let Some(code) = &self.nationality {
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ProofkitError::validation(format!(
                    "nationality must be a 3-letter code, got {code:?}"
                )));
            }
        }
        if let Some(ts) = self.timestamp {
            if ts > MAX_TIMESTAMP {
                return Err(ProofkitError::validation(format!(
                    "constraint timestamp {ts} exceeds 48 bits"
                )));
            }
        }
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.min_age.is_none()
            && self.nationality.is_none()
            && self.app_id.is_none()
            && self.timestamp.is_none()
    }
}

/// Externally supplied options describing a query, before validation.
///
/// The `kind` tag selects the variant: `"rawPassport"`, `"proofInputs"`,
/// `"proof"` or `"dummy"`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    pub kind: String,
    #[serde(default)]
    pub min_age: Option<u8>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub dummy: Option<String>,
}

impl Query {
    /// Parse externally supplied options into a query. Fails fast on an
    /// unrecognized tag or a malformed field.
    pub fn from_options(options: QueryOptions) -> Result<Query> {
        let constraints = QueryConstraints {
            min_age: options.min_age,
            nationality: options.nationality,
            app_id: options.app_id,
            timestamp: options.timestamp,
        };
        let query = match options.kind.as_str() {
            "rawPassport" => {
                if !constraints.is_empty() || options.dummy.is_some() {
                    return Err(ProofkitError::validation(
                        "rawPassport queries take no extra fields",
                    ));
                }
                Query::RawPassport
            }
            "proofInputs" => Query::ProofInputs(constraints),
            "proof" => Query::Proof(constraints),
            "dummy" => Query::Dummy {
                marker: options
                    .dummy
                    .ok_or_else(|| ProofkitError::validation("dummy queries need a marker"))?,
            },
            other => {
                return Err(ProofkitError::validation(format!(
                    "unrecognized query kind {other:?}"
                )))
            }
        };
        query.validate()?;
        Ok(query)
    }

    /// Validate a directly constructed query.
    pub fn validate(&self) -> Result<()> {
        match self {
            Query::RawPassport | Query::Dummy { .. } => Ok(()),
            Query::ProofInputs(constraints) | Query::Proof(constraints) => constraints.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_select_variants() {
        let query = Query::from_options(QueryOptions {
            kind: "proof".into(),
            min_age: Some(18),
            nationality: Some("FRA".into()),
            ..Default::default()
        })
        .unwrap();
        match query {
            Query::Proof(constraints) => {
                assert_eq!(constraints.min_age, Some(18));
                assert_eq!(constraints.nationality.as_deref(), Some("FRA"));
            }
            other => panic!("wrong variant: {other:?}"),
        }

        let query = Query::from_options(QueryOptions {
            kind: "dummy".into(),
            dummy: Some("abc".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(query, Query::Dummy { marker: "abc".into() });
    }

    #[test]
    fn test_unrecognized_kind_rejected() {
        let result = Query::from_options(QueryOptions {
            kind: "selfie".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ProofkitError::Validation(_))));
    }

    #[test]
    fn test_raw_passport_takes_no_fields() {
        let result = Query::from_options(QueryOptions {
            kind: "rawPassport".into(),
            min_age: Some(21),
            ..Default::default()
        });
        assert!(matches!(result, Err(ProofkitError::Validation(_))));

        assert_eq!(
            Query::from_options(QueryOptions {
                kind: "rawPassport".into(),
                ..Default::default()
            })
            .unwrap(),
            Query::RawPassport
        );
    }

    #[test]
    fn test_malformed_nationality_rejected() {
        for code in ["FR", "FRAN", "F1A"] {
            let result = Query::from_options(QueryOptions {
                kind: "proofInputs".into(),
                nationality: Some(code.into()),
                ..Default::default()
            });
            assert!(matches!(result, Err(ProofkitError::Validation(_))), "{code}");
        }
    }

    #[test]
    fn test_dummy_needs_marker() {
        let result = Query::from_options(QueryOptions {
            kind: "dummy".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ProofkitError::Validation(_))));
    }
}
