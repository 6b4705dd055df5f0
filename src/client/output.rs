use serde_json::Value;

use crate::error::{DriverError, DriverResult};
use crate::protocol::{CrudMethod, RpcReply};

/// Separator between table and id in a record reference (`person:123`).
const RECORD_SEPARATOR: char = ':';

fn is_record_id(target: &str) -> bool {
    target.contains(RECORD_SEPARATOR)
}

fn non_empty_array(value: &Value) -> Option<&Vec<Value>> {
    value.as_array().filter(|items| !items.is_empty())
}

/// Turn the reply to a CRUD-style call into its value.
///
/// A reply with neither a result nor an error yields `Value::Null`.
pub(crate) fn classify(method: CrudMethod, target: &str, reply: RpcReply) -> DriverResult<Value> {
    let result = match reply.into_result() {
        Err(error) => return Err(DriverError::Server(error.message)),
        Ok(None) => return Ok(Value::Null),
        Ok(Some(result)) => result,
    };

    match method {
        CrudMethod::Delete => Ok(Value::Null),
        CrudMethod::Create => first_or(&result, || {
            DriverError::Permission(format!("Unable to create record: {}", target))
        }),
        CrudMethod::Update | CrudMethod::Change | CrudMethod::Modify if is_record_id(target) => {
            first_or(&result, || {
                DriverError::Permission(format!("Unable to update record: {}", target))
            })
        }
        CrudMethod::Select if is_record_id(target) => match non_empty_array(&result) {
            Some(_) => Ok(result),
            None => Err(DriverError::Record(format!("Record not found: {}", target))),
        },
        _ => Ok(result),
    }
}

fn first_or(result: &Value, err: impl FnOnce() -> DriverError) -> DriverResult<Value> {
    non_empty_array(result)
        .and_then(|items| items.first())
        .cloned()
        .ok_or_else(err)
}
