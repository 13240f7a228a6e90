use crate::ai::Assistant;
use crate::auth::Session;
use crate::store::AcademicStateStore;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct ServerState {
    pub store: Option<AcademicStateStore>,
    pub assistant: Assistant,
    pub session: Option<Session>,
}

impl ServerState {
    pub fn new(assistant: Assistant) -> Self {
        Self {
            store: None,
            assistant,
            session: None,
        }
    }
}
