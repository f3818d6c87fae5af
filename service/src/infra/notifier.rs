//! [`Notifier`] delivering out-of-band notifications (emails, pushes).

use std::fmt;

use async_trait::async_trait;
use derive_more::{Display, Error as StdError};
use tracerr::Traced;
use tracing as log;

use crate::domain::{conversation, message, user};
#[cfg(doc)]
use crate::domain::{Conversation, Message, User};

/// Notification to be delivered to a [`User`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Notification {
    /// One-time code for verifying an [`user::Email`].
    OneTimeCode {
        /// [`user::Email`] to deliver the code to.
        email: user::Email,

        /// Code to be delivered.
        code: String,
    },

    /// New [`Message`] for an offline [`User`].
    NewMessage {
        /// ID of the [`User`] to notify.
        user_id: user::Id,

        /// ID of the [`Conversation`] the [`Message`] was sent to.
        conversation_id: conversation::Id,

        /// ID of the sent [`Message`].
        message_id: message::Id,

        /// Beginning of the [`Message`] content.
        preview: String,
    },
}

/// [`Notifier`] error.
#[derive(Debug, Display, StdError)]
pub enum Error {
    /// Delivery channel rejected the [`Notification`].
    #[display("`Notification` delivery failed: {_0}")]
    Delivery(#[error(not(source))] String),
}

/// Deliverer of [`Notification`]s.
#[async_trait]
pub trait Notifier: fmt::Debug + Send + Sync {
    /// Delivers the provided [`Notification`].
    ///
    /// # Errors
    ///
    /// If the [`Notification`] cannot be delivered.
    async fn notify(
        &self,
        notification: Notification,
    ) -> Result<(), Traced<Error>>;
}

/// [`Notifier`] writing [`Notification`]s to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct Log;

#[async_trait]
impl Notifier for Log {
    async fn notify(
        &self,
        notification: Notification,
    ) -> Result<(), Traced<Error>> {
        match notification {
            Notification::OneTimeCode { email, code: _ } => {
                log::info!(%email, "one-time code issued");
            }
            Notification::NewMessage {
                user_id,
                conversation_id,
                message_id,
                preview,
            } => {
                log::info!(
                    %user_id,
                    %conversation_id,
                    %message_id,
                    preview,
                    "new message for offline user",
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub use self::recording::Recording;

#[cfg(test)]
mod recording {
    //! [`Recording`] [`Notifier`].

    use std::sync::{Arc, Mutex, PoisonError};

    use async_trait::async_trait;
    use tracerr::Traced;

    use super::{Error, Notification, Notifier};

    /// [`Notifier`] remembering every delivered [`Notification`].
    #[derive(Clone, Debug, Default)]
    pub struct Recording(Arc<Mutex<Vec<Notification>>>);

    impl Recording {
        /// Returns all the [`Notification`]s delivered so far.
        #[must_use]
        pub fn delivered(&self) -> Vec<Notification> {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }
    }

    #[async_trait]
    impl Notifier for Recording {
        async fn notify(
            &self,
            notification: Notification,
        ) -> Result<(), Traced<Error>> {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(notification);
            Ok(())
        }
    }
}
