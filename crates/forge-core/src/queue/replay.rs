//! Replay: map one queued action onto the matching remote call.
//!
//! Dispatch by kind (the queue never reorders or batches):
//! - create_task   → `create_task(payload + user_id)`
//! - update_task   → `update_task(payload.id, payload - id)`
//! - complete_task → `complete_task(payload.id, { user_id })`

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::domain::{ActionKind, ActionPayload, CompleteTask, CreateTask, OfflineAction, ReplayError, UpdateTask};
use crate::ports::TaskApi;

/// Replay one action. `Ok(())` only when the remote confirmed success.
pub async fn replay(api: &dyn TaskApi, action: &OfflineAction, user_id: &str) -> Result<(), ReplayError> {
    match action.kind {
        ActionKind::CreateTask => {
            let CreateTask { mut fields } = decode::<CreateTask>(action)?;
            fields.insert("user_id".to_string(), Value::String(user_id.to_string()));
            api.create_task(&Value::Object(fields)).await
        }
        ActionKind::UpdateTask => {
            let UpdateTask { id, fields } = decode::<UpdateTask>(action)?;
            require_id::<UpdateTask>(&id)?;
            api.update_task(&id, &Value::Object(fields)).await
        }
        ActionKind::CompleteTask => {
            let CompleteTask { id } = decode::<CompleteTask>(action)?;
            require_id::<CompleteTask>(&id)?;
            api.complete_task(&id, &json!({ "user_id": user_id })).await
        }
    }
}

fn decode<P: ActionPayload + DeserializeOwned>(action: &OfflineAction) -> Result<P, ReplayError> {
    P::deserialize(&action.payload).map_err(|e| ReplayError::InvalidPayload {
        kind: P::KIND,
        reason: e.to_string(),
    })
}

fn require_id<P: ActionPayload>(id: &str) -> Result<(), ReplayError> {
    if id.trim().is_empty() {
        return Err(ReplayError::InvalidPayload {
            kind: P::KIND,
            reason: "task id is empty".to_string(),
        });
    }
    Ok(())
}
