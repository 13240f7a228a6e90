//! Demo sign-in. Identifies who is using the UI; nothing else is gated on it.

use crate::config::{DEMO_TEACHER_EMAIL, DEMO_TEACHER_PASSWORD};
use crate::model::{AppState, ForumRole};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub role: ForumRole,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
}

pub fn login(state: &AppState, identifier: &str, password: &str) -> Option<Session> {
    let identifier = identifier.trim();
    if identifier.eq_ignore_ascii_case(DEMO_TEACHER_EMAIL) && password == DEMO_TEACHER_PASSWORD {
        return Some(Session {
            role: ForumRole::Teacher,
            display_name: state.settings.teacher_name.clone(),
            student_id: None,
            class_id: None,
        });
    }
    state.student(identifier).map(|s| Session {
        role: ForumRole::Student,
        display_name: s.name.clone(),
        student_id: Some(s.id.clone()),
        class_id: Some(s.class_id.clone()),
    })
}
