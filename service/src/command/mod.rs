//! [`Command`] definition.

pub mod archive_conversation;
pub mod authorize_user_session;
pub mod cancel_booking;
pub mod confirm_booking_payment;
pub mod connect_user;
pub mod create_booking;
pub mod create_property;
pub mod create_user;
pub mod create_user_session;
pub mod delete_conversation;
pub mod delete_message;
pub mod disconnect_user;
pub mod edit_message;
pub mod find_or_create_conversation;
pub mod issue_one_time_code;
pub mod join_conversation;
pub mod leave_conversation;
pub mod mark_conversation_read;
pub mod notify_typing;
pub mod send_message;
pub mod verify_user;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    archive_conversation::ArchiveConversation,
    authorize_user_session::AuthorizeUserSession,
    cancel_booking::CancelBooking,
    confirm_booking_payment::ConfirmBookingPayment,
    connect_user::ConnectUser, create_booking::CreateBooking,
    create_property::CreateProperty, create_user::CreateUser,
    create_user_session::CreateUserSession,
    delete_conversation::DeleteConversation, delete_message::DeleteMessage,
    disconnect_user::DisconnectUser, edit_message::EditMessage,
    find_or_create_conversation::FindOrCreateConversation,
    issue_one_time_code::IssueOneTimeCode,
    join_conversation::JoinConversation,
    leave_conversation::LeaveConversation,
    mark_conversation_read::MarkConversationRead,
    notify_typing::NotifyTyping, send_message::SendMessage,
    verify_user::VerifyUser,
};
