//! Scripted [`PaymentGateway`] implementation.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tracerr::Traced;
use uuid::Uuid;

use crate::domain::payment;

use super::{Error, Initialize, PaymentGateway, Session, Transaction, Verify};

/// Behaviour of a [`Scripted`] gateway.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Mode {
    /// Every transaction is paid in full.
    #[default]
    Success,

    /// Every transaction is declined by the customer's bank.
    Declined,

    /// Gateway cannot be reached.
    Unavailable,
}

/// [`PaymentGateway`] answering according to its current [`Mode`] without
/// any network calls.
#[derive(Clone, Debug, Default)]
pub struct Scripted {
    /// Inner state of this [`Scripted`] gateway.
    inner: Arc<Mutex<State>>,
}

/// State of a [`Scripted`] gateway.
#[derive(Debug, Default)]
struct State {
    /// Current [`Mode`].
    mode: Mode,

    /// Time every [`Initialize`] operation takes.
    latency: Duration,

    /// Initialized transactions.
    initialized: HashMap<payment::Reference, Initialize>,

    /// Number of performed [`Verify`] operations.
    verifications: usize,
}

impl Scripted {
    /// Switches this [`Scripted`] gateway to the provided [`Mode`].
    pub fn set_mode(&self, mode: Mode) {
        self.lock().mode = mode;
    }

    /// Makes every [`Initialize`] operation take the provided `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Returns the number of performed [`Verify`] operations.
    #[must_use]
    pub fn verifications(&self) -> usize {
        self.lock().verifications
    }

    /// Locks the [`State`] of this [`Scripted`] gateway.
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PaymentGateway<Initialize> for Scripted {
    type Ok = Session;
    type Err = Traced<Error>;

    async fn execute(&self, op: Initialize) -> Result<Self::Ok, Self::Err> {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        if state.mode == Mode::Unavailable {
            return Err(tracerr::new!(Error::Rejected("unavailable".into())));
        }

        let reference = payment::Reference::new(format!("T{}", Uuid::new_v4()))
            .ok_or(Error::Malformed("invalid `reference`"))
            .map_err(tracerr::wrap!())?;
        _ = state.initialized.insert(reference.clone(), op);

        Ok(Session {
            redirect_url: format!("https://checkout.test/{reference}"),
            reference,
        })
    }
}

impl PaymentGateway<Verify> for Scripted {
    type Ok = Transaction;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Verify(reference): Verify,
    ) -> Result<Self::Ok, Self::Err> {
        let mut state = self.lock();
        state.verifications += 1;

        let status = match state.mode {
            Mode::Success => Transaction::SUCCESS,
            Mode::Declined => "failed",
            Mode::Unavailable => {
                return Err(tracerr::new!(Error::Rejected(
                    "unavailable".into()
                )));
            }
        };
        let amount = state
            .initialized
            .get(&reference)
            .map(|op| op.amount)
            .ok_or_else(|| Error::Rejected("Transaction not found".into()))
            .map_err(tracerr::wrap!())?;

        Ok(Transaction {
            status: status.into(),
            reference,
            amount_minor: amount.to_minor_units().unwrap_or_default(),
            currency: Some(amount.currency),
            channel: payment::Channel::new("card"),
            paid_at: Some(payment::PaidDateTime::now()),
        })
    }
}
