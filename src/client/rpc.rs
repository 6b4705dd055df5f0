use serde_json::{json, Value};

use super::output::classify;
use super::Client;
use crate::error::{DriverError, DriverResult};
use crate::outcome::{AuthOutcome, SelectOutcome};
use crate::protocol::{Auth, CrudMethod, Patch, RpcReply, UseConfig};

/// Generic handling: server errors reject, anything else is the payload.
fn into_value(reply: RpcReply) -> DriverResult<Option<Value>> {
    reply
        .into_result()
        .map_err(|e| DriverError::Server(e.message))
}

/// Like `into_value`, but server errors are authentication failures.
fn into_auth_value(reply: RpcReply) -> DriverResult<Option<Value>> {
    reply
        .into_result()
        .map_err(|e| DriverError::Authentication(e.message))
}

impl Client {
    pub async fn ping(&self) -> DriverResult<()> {
        let reply = self.call("ping", vec![]).await?;
        into_value(reply).map(|_| ())
    }

    /// Switch namespace and database; falls back to the configured `use`.
    ///
    /// A server rejection is reported in the outcome, not as an `Err`.
    pub async fn use_database(&self, config: Option<&UseConfig>) -> DriverResult<SelectOutcome> {
        let config = match config {
            Some(config) => config.clone(),
            None => self
                .config()
                .and_then(|c| c.use_config)
                .ok_or_else(|| {
                    DriverError::NotConfigured(
                        "No use configuration provided and none configured".to_string(),
                    )
                })?,
        };

        let reply = self
            .call("use", vec![json!(config.ns), json!(config.db)])
            .await?;
        Ok(match reply.into_result() {
            Ok(data) => SelectOutcome::successful(data),
            Err(e) => SelectOutcome::failed(e.message),
        })
    }

    pub async fn info(&self) -> DriverResult<Option<Value>> {
        let reply = self.call("info", vec![]).await?;
        into_value(reply)
    }

    /// Sign up to a scope and keep the returned token.
    pub async fn signup(&self, vars: &Auth) -> DriverResult<String> {
        let reply = self.call("signup", vec![serde_json::to_value(vars)?]).await?;
        match into_auth_value(reply)? {
            Some(Value::String(token)) => {
                self.set_token(Some(token.clone()));
                Ok(token)
            }
            _ => Err(DriverError::Authentication(
                "Signup did not return a token".to_string(),
            )),
        }
    }

    /// Sign in with `auth`, or the configured credentials.
    ///
    /// A rejected sign-in is reported in the outcome, not as an `Err`.
    pub async fn signin(&self, auth: Option<&Auth>) -> DriverResult<AuthOutcome> {
        let auth = match auth {
            Some(auth) => auth.clone(),
            None => self.config().and_then(|c| c.auth).ok_or_else(|| {
                DriverError::NotConfigured(
                    "No auth variables provided and none configured".to_string(),
                )
            })?,
        };

        let reply = self.call("signin", vec![serde_json::to_value(&auth)?]).await?;
        Ok(match reply.into_result() {
            Ok(Some(Value::String(token))) => {
                self.set_token(Some(token.clone()));
                AuthOutcome::successful(token)
            }
            Ok(_) => {
                self.set_token(None);
                AuthOutcome::successful_without_token()
            }
            Err(e) => AuthOutcome::failed(e.message),
        })
    }

    /// Drop the session's authentication and forget the stored token.
    pub async fn invalidate(&self) -> DriverResult<()> {
        let reply = self.call("invalidate", vec![]).await?;
        into_auth_value(reply)?;
        self.set_token(None);
        Ok(())
    }

    pub async fn authenticate(&self, token: &str) -> DriverResult<Option<Value>> {
        let reply = self.call("authenticate", vec![json!(token)]).await?;
        let value = into_auth_value(reply)?;
        self.set_token(Some(token.to_string()));
        Ok(value)
    }

    /// Start a live query on `table`, returning its id.
    pub async fn live(&self, table: &str) -> DriverResult<String> {
        let reply = self.call("live", vec![json!(table)]).await?;
        match into_value(reply)? {
            Some(Value::String(id)) => Ok(id),
            other => Err(DriverError::Protocol(format!(
                "Expected a live query id, got {:?}",
                other
            ))),
        }
    }

    pub async fn kill(&self, query_id: &str) -> DriverResult<()> {
        let reply = self.call("kill", vec![json!(query_id)]).await?;
        into_value(reply).map(|_| ())
    }

    /// Define a session variable usable as `$key` in later queries.
    pub async fn let_var(&self, key: &str, value: Value) -> DriverResult<()> {
        let reply = self.call("let", vec![json!(key), value]).await?;
        into_value(reply).map(|_| ())
    }

    pub async fn query(&self, sql: &str, vars: Option<Value>) -> DriverResult<Value> {
        let reply = self
            .call("query", vec![json!(sql), vars.unwrap_or(Value::Null)])
            .await?;
        Ok(into_value(reply)?.unwrap_or(Value::Null))
    }

    // ==================== Records ====================

    pub async fn select(&self, thing: &str) -> DriverResult<Value> {
        self.crud(CrudMethod::Select, thing, None).await
    }

    pub async fn create(&self, thing: &str, data: Option<Value>) -> DriverResult<Value> {
        self.crud(CrudMethod::Create, thing, Some(data.unwrap_or(Value::Null)))
            .await
    }

    /// Replace record content.
    pub async fn update(&self, thing: &str, data: Option<Value>) -> DriverResult<Value> {
        self.crud(CrudMethod::Update, thing, Some(data.unwrap_or(Value::Null)))
            .await
    }

    /// Merge into record content.
    pub async fn change(&self, thing: &str, data: Option<Value>) -> DriverResult<Value> {
        self.crud(CrudMethod::Change, thing, Some(data.unwrap_or(Value::Null)))
            .await
    }

    pub async fn modify(&self, thing: &str, patches: Vec<Patch>) -> DriverResult<Value> {
        let patches = serde_json::to_value(patches)?;
        self.crud(CrudMethod::Modify, thing, Some(patches)).await
    }

    pub async fn delete(&self, thing: &str) -> DriverResult<()> {
        self.crud(CrudMethod::Delete, thing, None).await.map(|_| ())
    }

    async fn crud(&self, method: CrudMethod, thing: &str, data: Option<Value>) -> DriverResult<Value> {
        let mut params = vec![json!(thing)];
        params.extend(data);
        let reply = self.call(method.as_str(), params).await?;
        classify(method, thing, reply)
    }
}
