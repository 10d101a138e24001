//! Task supervisor
//!
//! Runs a named group of tasks under one cancellation token. The first task
//! that fails or panics cancels the whole group; its error is the group's
//! result.

use std::any::Any;
use std::future::Future;

use contracts::DaemonError;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

type TaskOutcome = (String, Result<Result<(), DaemonError>, JoinError>);

pub(crate) struct TaskGroup {
    tasks: JoinSet<TaskOutcome>,
    token: CancellationToken,
    first_error: Option<DaemonError>,
}

impl TaskGroup {
    /// Create a group whose token is a child of `parent`
    pub(crate) fn new(parent: &CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            token: parent.child_token(),
            first_error: None,
        }
    }

    /// Group-wide token, cancelled externally or on the first failure
    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawn a supervised task
    ///
    /// The task runs in its own inner spawn so a panic surfaces as a
    /// `JoinError` tagged with the task name.
    pub(crate) fn spawn<F>(&mut self, name: impl Into<String>, task: F)
    where
        F: Future<Output = Result<(), DaemonError>> + Send + 'static,
    {
        let name = name.into();
        let inner = tokio::spawn(task);
        self.tasks.spawn(async move { (name, inner.await) });
    }

    /// Wait until the group token is cancelled
    ///
    /// Tasks finishing meanwhile are collected; a failure cancels the group.
    pub(crate) async fn supervise(&mut self) {
        loop {
            tokio::select! {
                _ = self.token.cancelled() => return,
                Some(joined) = self.tasks.join_next() => self.collect(joined),
            }
        }
    }

    /// Wait for every task and return the first failure
    pub(crate) async fn join(mut self) -> Result<(), DaemonError> {
        while let Some(joined) = self.tasks.join_next().await {
            self.collect(joined);
        }
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn collect(&mut self, joined: Result<TaskOutcome, JoinError>) {
        let (name, result) = match joined {
            Ok(outcome) => outcome,
            Err(e) => ("supervisor".to_string(), Err(e)),
        };

        let failure = match result {
            Ok(Ok(())) => {
                debug!(task = %name, "task finished");
                return;
            }
            Ok(Err(e)) => e,
            Err(join_error) if join_error.is_panic() => {
                DaemonError::panic(&name, panic_message(join_error.into_panic()))
            }
            Err(join_error) => DaemonError::panic(&name, join_error.to_string()),
        };

        error!(task = %name, error = %failure, "task failed, cancelling group");
        self.token.cancel();
        if self.first_error.is_none() {
            self.first_error = Some(failure);
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ErrorKind;
    use std::time::Duration;

    #[tokio::test]
    async fn test_clean_group() {
        let root = CancellationToken::new();
        let mut group = TaskGroup::new(&root);
        let token = group.token();
        group.spawn("waiter", async move {
            token.cancelled().await;
            Ok(())
        });

        root.cancel();
        group.supervise().await;
        assert!(group.join().await.is_ok());
    }

    #[tokio::test]
    async fn test_panic_cancels_group() {
        let root = CancellationToken::new();
        let mut group = TaskGroup::new(&root);
        let token = group.token();

        group.spawn("bystander", async move {
            token.cancelled().await;
            Ok(())
        });
        group.spawn("runner-0", async {
            panic!("sink exploded");
        });

        tokio::time::timeout(Duration::from_secs(1), group.supervise())
            .await
            .expect("panic must cancel the group");
        assert!(!root.is_cancelled());

        let err = group.join().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Panic);
        assert!(err.to_string().contains("runner-0"));
        assert!(err.to_string().contains("sink exploded"));
    }

    #[tokio::test]
    async fn test_first_error_wins() {
        let root = CancellationToken::new();
        let mut group = TaskGroup::new(&root);
        group.spawn("a", async { Err(DaemonError::fold("first")) });

        group.supervise().await;
        group.spawn("b", async { Err(DaemonError::fold("second")) });

        let err = group.join().await.unwrap_err();
        assert!(err.message().contains("first"));
    }
}
