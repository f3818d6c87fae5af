//! Background environment for running [`Task`]s.

use std::{
    error::Error,
    future::{Future, IntoFuture},
};

use derive_more::{Display, Error as StdError};
use futures::{
    future::{self, LocalBoxFuture},
    FutureExt as _,
};
use tokio::task;
use tracing as log;

#[cfg(doc)]
use crate::Task;

/// Background environment for running named [`Task`]s on the current
/// thread.
///
/// Resolves once any of its [`Task`]s stops.
#[derive(Debug, Default)]
pub struct Background {
    /// Local set the [`Task`]s are spawned onto.
    set: task::LocalSet,

    /// Names and handles of the spawned [`Task`]s.
    handles: Vec<(&'static str, task::JoinHandle<Result<(), Box<dyn Error>>>)>,
}

impl Background {
    /// Spawns a new [`Task`] with the provided `name` inside this
    /// [`Background`] environment.
    pub fn spawn<F, E>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: Error + 'static,
    {
        log::debug!(task = name, "background task spawned");
        let handle = self.set.spawn_local(future.map(|r| {
            r.map_err(|e| -> Box<dyn Error> { Box::new(e) })
        }));
        self.handles.push((name, handle));
    }

    /// Returns the number of [`Task`]s spawned into this [`Background`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Indicates whether no [`Task`] has been spawned into this
    /// [`Background`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// [`Background`] [`Task`] that has stopped.
#[derive(Debug, Display, StdError)]
#[display("background task `{task}` stopped: {reason}")]
pub struct Stopped {
    /// Name of the stopped [`Task`].
    pub task: &'static str,

    /// Reason of the stop.
    pub reason: String,
}

impl IntoFuture for Background {
    type Output = Stopped;
    type IntoFuture = LocalBoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { set, handles } = self;
        let watched = handles
            .into_iter()
            .map(|(task, handle)| {
                handle
                    .map(move |res| {
                        let reason = match res {
                            Ok(Ok(())) => "finished".to_owned(),
                            Ok(Err(e)) => format!("failed: {e}"),
                            Err(e) => format!("panicked: {e}"),
                        };
                        log::error!(task, %reason, "background task stopped");
                        Stopped { task, reason }
                    })
                    .boxed_local()
            })
            .collect::<Vec<_>>();
        async move {
            set.run_until(async move {
                if watched.is_empty() {
                    return future::pending().await;
                }
                future::select_all(watched).await.0
            })
            .await
        }
        .boxed_local()
    }
}

#[cfg(test)]
mod spec {
    use std::{convert::Infallible, io};

    use futures::future;

    use super::Background;

    #[tokio::test]
    async fn resolves_with_first_stopped_task() {
        let mut bg = Background::default();
        bg.spawn("forever", future::pending::<Result<(), Infallible>>());
        bg.spawn("broken", async {
            Err::<(), _>(io::Error::other("boom"))
        });
        assert_eq!(bg.len(), 2);

        let stopped = bg.await;

        assert_eq!(stopped.task, "broken");
        assert_eq!(stopped.reason, "failed: boom");
    }
}
