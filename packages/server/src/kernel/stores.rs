//! Store resolution: maps a requested store name to credentials.
//!
//! Credentials come from the immutable startup configuration; resolution is
//! a pure function with no side effects. Ambiguity fails loudly so an export
//! never silently runs against the wrong store's account.

use thiserror::Error;

use crate::config::ConfiguredStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No stores configured; set EFFI_USER/EFFI_PASS or EFFI_USER_<STORE>/EFFI_PASS_<STORE>")]
    NoneConfigured,

    #[error("Unknown store '{name}'. Available stores: {}", available.join(", "))]
    NotFound { name: String, available: Vec<String> },

    #[error("Multiple stores configured, storeName is required. Available stores: {}", available.join(", "))]
    Ambiguous { available: Vec<String> },

    #[error("Store '{name}' is missing a username or password")]
    Incomplete { name: String },
}

/// Resolved credentials for one store. Read-only.
#[derive(Debug, Clone)]
pub struct StoreCredential {
    pub name: String,
    pub username: String,
    pub password: String,
}

/// Resolve a store name (case-insensitive) to its credentials.
///
/// With no name requested, succeeds only when exactly one store is
/// configured; otherwise the caller must disambiguate.
pub fn resolve(
    stores: &[ConfiguredStore],
    requested: Option<&str>,
) -> Result<StoreCredential, StoreError> {
    if stores.is_empty() {
        return Err(StoreError::NoneConfigured);
    }

    let store = match requested {
        Some(name) => stores
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
                available: store_names(stores),
            })?,
        None => {
            if stores.len() > 1 {
                return Err(StoreError::Ambiguous {
                    available: store_names(stores),
                });
            }
            &stores[0]
        }
    };

    match (&store.username, &store.password) {
        (Some(username), Some(password)) => Ok(StoreCredential {
            name: store.name.clone(),
            username: username.clone(),
            password: password.clone(),
        }),
        _ => Err(StoreError::Incomplete {
            name: store.name.clone(),
        }),
    }
}

fn store_names(stores: &[ConfiguredStore]) -> Vec<String> {
    stores.iter().map(|s| s.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(name: &str) -> ConfiguredStore {
        ConfiguredStore {
            name: name.to_string(),
            username: Some(format!("{}@example.com", name.to_lowercase())),
            password: Some("secret".to_string()),
        }
    }

    #[test]
    fn no_stores_fails() {
        assert!(matches!(resolve(&[], None), Err(StoreError::NoneConfigured)));
    }

    #[test]
    fn single_store_resolves_without_name() {
        let credential = resolve(&[store("A")], None).unwrap();
        assert_eq!(credential.name, "A");
        assert_eq!(credential.username, "a@example.com");
    }

    #[test]
    fn two_stores_without_name_is_ambiguous() {
        let err = resolve(&[store("A"), store("B")], None).unwrap_err();
        match err {
            StoreError::Ambiguous { available } => {
                assert!(available.contains(&"A".to_string()));
                assert!(available.contains(&"B".to_string()));
            }
            other => panic!("expected Ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let credential = resolve(&[store("A"), store("B")], Some("a")).unwrap();
        assert_eq!(credential.name, "A");
    }

    #[test]
    fn unknown_store_lists_available() {
        let err = resolve(&[store("A")], Some("C")).unwrap_err();
        match err {
            StoreError::NotFound { name, available } => {
                assert_eq!(name, "C");
                assert_eq!(available, vec!["A".to_string()]);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn missing_password_is_incomplete() {
        let broken = ConfiguredStore {
            name: "A".to_string(),
            username: Some("a@example.com".to_string()),
            password: None,
        };
        assert!(matches!(
            resolve(&[broken], Some("A")),
            Err(StoreError::Incomplete { .. })
        ));
    }
}
