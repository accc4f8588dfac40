//! Poll pacing with a deadline and a shutdown signal.
//!
//! Every blocking step of a testcase (cluster calls, trigger calls, the
//! sleep between attempts) runs through [`Poller::guard`], so a deadline
//! or a shutdown request interrupts whichever step is in flight.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::controller::VerificationPhase;
use crate::error::VerifyError;

#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    deadline: Option<Instant>,
    shutdown: watch::Receiver<bool>,
}

impl Poller {
    /// A poller with no deadline. `shutdown` flipping to `true` cancels.
    pub fn new(interval: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            interval,
            deadline: None,
            shutdown,
        }
    }

    /// Set the deadline to `timeout` from now (`None` clears it).
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.deadline = timeout.map(|t| Instant::now() + t);
        self
    }

    /// Time left before the deadline, if one is set.
    #[cfg(test)]
    fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Run `fut` unless the deadline passes or shutdown is requested first.
    pub async fn guard<F: Future>(
        &mut self,
        phase: VerificationPhase,
        fut: F,
    ) -> Result<F::Output, VerifyError> {
        if *self.shutdown.borrow() {
            return Err(VerifyError::Cancelled);
        }
        let deadline = self.deadline;

        tokio::select! {
            out = fut => Ok(out),
            _ = until(deadline) => Err(VerifyError::Timeout { phase }),
            _ = cancelled(&mut self.shutdown) => Err(VerifyError::Cancelled),
        }
    }

    /// Sleep one poll interval.
    pub async fn pause(&mut self, phase: VerificationPhase) -> Result<(), VerifyError> {
        let interval = self.interval;
        self.guard(phase, tokio::time::sleep(interval)).await
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        // Sender dropped: nothing can cancel any more.
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHASE: VerificationPhase = VerificationPhase::WaitingForRevision;

    #[tokio::test]
    async fn guard_returns_the_output() {
        let (_tx, rx) = watch::channel(false);
        let mut poller = Poller::new(Duration::from_millis(1), rx);
        assert_eq!(poller.guard(PHASE, async { 7 }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn deadline_interrupts_a_hung_step() {
        let (_tx, rx) = watch::channel(false);
        let mut poller =
            Poller::new(Duration::from_millis(1), rx).with_timeout(Some(Duration::from_millis(20)));

        let result = poller.guard(PHASE, std::future::pending::<()>()).await;
        assert!(matches!(
            result,
            Err(VerifyError::Timeout { phase: VerificationPhase::WaitingForRevision })
        ));
        assert_eq!(poller.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn shutdown_interrupts_a_sleep() {
        let (tx, rx) = watch::channel(false);
        let mut poller = Poller::new(Duration::from_secs(3600), rx);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send(true).unwrap();
        });

        assert!(matches!(poller.pause(PHASE).await, Err(VerifyError::Cancelled)));
        stopper.await.unwrap();
    }

    #[tokio::test]
    async fn already_cancelled_short_circuits() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let mut poller = Poller::new(Duration::from_millis(1), rx);
        assert!(matches!(
            poller.guard(PHASE, async { 1 }).await,
            Err(VerifyError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn dropped_sender_never_cancels() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let mut poller = Poller::new(Duration::from_millis(1), rx);
        poller.pause(PHASE).await.unwrap();
        assert_eq!(poller.remaining(), None);
    }
}
