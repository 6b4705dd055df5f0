use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Credentials accepted by `signin`/`signup`.
///
/// Variants are distinguished by which keys are present, most specific first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Auth {
    Scope {
        #[serde(rename = "NS")]
        namespace: String,
        #[serde(rename = "DB")]
        database: String,
        #[serde(rename = "SC")]
        scope: String,
        #[serde(flatten)]
        vars: Map<String, Value>,
    },
    Database {
        #[serde(rename = "NS")]
        namespace: String,
        #[serde(rename = "DB")]
        database: String,
        user: String,
        pass: String,
    },
    Namespace {
        #[serde(rename = "NS")]
        namespace: String,
        user: String,
        pass: String,
    },
    Root {
        user: String,
        pass: String,
    },
}

impl Auth {
    pub fn root(user: &str, pass: &str) -> Self {
        Auth::Root {
            user: user.to_string(),
            pass: pass.to_string(),
        }
    }

    pub fn namespace(namespace: &str, user: &str, pass: &str) -> Self {
        Auth::Namespace {
            namespace: namespace.to_string(),
            user: user.to_string(),
            pass: pass.to_string(),
        }
    }

    pub fn database(namespace: &str, database: &str, user: &str, pass: &str) -> Self {
        Auth::Database {
            namespace: namespace.to_string(),
            database: database.to_string(),
            user: user.to_string(),
            pass: pass.to_string(),
        }
    }

    pub fn scope(namespace: &str, database: &str, scope: &str, vars: Map<String, Value>) -> Self {
        Auth::Scope {
            namespace: namespace.to_string(),
            database: database.to_string(),
            scope: scope.to_string(),
            vars,
        }
    }
}

/// Namespace and database selected by `use`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseConfig {
    pub ns: String,
    pub db: String,
}

impl UseConfig {
    pub fn new(ns: &str, db: &str) -> Self {
        Self {
            ns: ns.to_string(),
            db: db.to_string(),
        }
    }
}

/// A JSON Patch operation sent by `modify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Patch {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Change { path: String, value: String },
}
