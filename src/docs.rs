use crate::api::ai::AiRequest;
use crate::api::attendance::{ClockReq, UpdateAttendance};
use crate::api::message::SendMessage;
use crate::api::task::{CreateTask, UpdateTaskStatus};
use crate::api::user::{UpdateRoleReq, UpdateTokensReq};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::message::Message;
use crate::model::role::Role;
use crate::model::task::{Task, TaskPriority, TaskStatus};
use crate::model::user::User;
use crate::models::{LoginReqDto, LogoutReq, Session, SignupReq};
use crate::service::conversation::ConversationSummary;
use crate::service::metering::TokenCheck;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "TaskFlow API",
        version = "1.0.0",
        description = r#"
## TaskFlow

Task, attendance and chat service for small teams, with a token-metered AI assistant.

### Key Features
- **Tasks**: admins assign work, employees track its status
- **Attendance**: daily clock-in / clock-out, admin day-status overrides
- **Messages**: direct messages, grouped into conversations on read
- **AI assistant**: every employee holds a token allocation; admins are unlimited

### Security
Everything outside `/api/auth` requires a **JWT Bearer** access token.
Role changes, token allocations and task management are **admin only**.

### Response Format
Every body carries `success`; failures add `message` and `error`.
"#,
    ),
    paths(
        crate::auth::handlers::signup,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,

        crate::api::user::list_users,
        crate::api::user::get_user_by_email,
        crate::api::user::update_user_role,
        crate::api::user::update_user_tokens,

        crate::api::task::create_task,
        crate::api::task::list_tasks,
        crate::api::task::get_task,
        crate::api::task::get_user_tasks,
        crate::api::task::update_task_status,
        crate::api::task::update_task,
        crate::api::task::delete_task,

        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::get_user_attendance,
        crate::api::attendance::list_attendance,
        crate::api::attendance::update_attendance,

        crate::api::message::send_message,
        crate::api::message::get_conversation,
        crate::api::message::get_all_conversations,
        crate::api::message::inbox,
        crate::api::message::mark_read,

        crate::api::ai::send_ai_request,
        crate::api::ai::get_balance
    ),
    components(
        schemas(
            SignupReq,
            LoginReqDto,
            LogoutReq,
            Session,
            User,
            Role,
            UpdateRoleReq,
            UpdateTokensReq,
            Task,
            TaskStatus,
            TaskPriority,
            CreateTask,
            UpdateTaskStatus,
            AttendanceRecord,
            AttendanceStatus,
            ClockReq,
            UpdateAttendance,
            Message,
            SendMessage,
            ConversationSummary,
            AiRequest,
            TokenCheck
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Signup, login and session APIs"),
        (name = "Users", description = "User directory and admin controls"),
        (name = "Tasks", description = "Task management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Messages", description = "Direct messaging APIs"),
        (name = "AI", description = "Token-metered AI assistant"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_value(&doc).unwrap();

        assert!(json["paths"]["/api/ai/request"]["post"].is_object());
        assert!(json["paths"]["/api/messages/conversation"]["get"].is_object());
        assert!(json["paths"]["/api/tasks/{task_id}"]["delete"].is_object());
        assert_eq!(
            json["components"]["securitySchemes"]["bearer_auth"]["scheme"],
            "bearer"
        );
    }
}
