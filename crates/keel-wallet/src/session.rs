//! The one-shot signing session.
//!
//! A session walks `Loaded → Validated → Composed → Signed → Emitted`, one
//! transition per call, and never goes backwards. Any failure parks the
//! session in a terminal `Rejected` state carrying the reason code; every
//! later call then reports the same rejection. Out-of-order calls are their
//! own error and do not consume the session.

use tracing::debug;

use keel_core::address::Address;
use keel_core::error::{InputError, KeelError};
use keel_core::keys::SecretKey;

use keel_chain::checkpoint::VerifierContext;
use keel_envelope::Envelope;

use crate::builder::{FeePolicy, SignedTransaction, SpendPlan, plan_spend, sign_plan};

/// Where a session currently stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Loaded,
    Validated,
    Composed,
    Signed,
    Emitted,
    /// Terminal failure; carries the stable reason code.
    Rejected(String),
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            SessionState::Loaded => "Loaded",
            SessionState::Validated => "Validated",
            SessionState::Composed => "Composed",
            SessionState::Signed => "Signed",
            SessionState::Emitted => "Emitted",
            SessionState::Rejected(_) => "Rejected",
        }
    }
}

/// A single signing session over a batch of envelope bytes.
pub struct SigningSession {
    state: SessionState,
    ctx: VerifierContext,
    raw_envelopes: Vec<Vec<u8>>,
    envelopes: Vec<Envelope>,
    plan: Option<SpendPlan>,
    signed: Option<SignedTransaction>,
}

impl SigningSession {
    /// Open a session over raw envelope bytes.
    pub fn load(ctx: VerifierContext, raw_envelopes: Vec<Vec<u8>>) -> Self {
        Self {
            state: SessionState::Loaded,
            ctx,
            raw_envelopes,
            envelopes: Vec::new(),
            plan: None,
            signed: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The rejection reason code, once rejected.
    pub fn rejection(&self) -> Option<&str> {
        match &self.state {
            SessionState::Rejected(reason) => Some(reason),
            _ => None,
        }
    }

    /// The validated envelopes (available from `Validated` onward).
    pub fn envelopes(&self) -> &[Envelope] {
        &self.envelopes
    }

    /// Fee and change of the composed plan, once composed.
    pub fn plan_summary(&self) -> Option<(u64, u64)> {
        self.plan.as_ref().map(|p| (p.fee, p.change))
    }

    fn expect_state(&self, expected: &'static str) -> Result<(), KeelError> {
        if self.state.name() != expected {
            return Err(InputError::SessionState {
                expected,
                actual: self.state.name(),
            }
            .into());
        }
        Ok(())
    }

    /// Run a transition, parking the session in `Rejected` on failure.
    fn transition<T>(
        &mut self,
        result: Result<T, KeelError>,
        next: SessionState,
    ) -> Result<T, KeelError> {
        match result {
            Ok(value) => {
                self.state = next;
                Ok(value)
            }
            Err(err) => {
                self.state = SessionState::Rejected(err.reason_code().to_string());
                Err(err)
            }
        }
    }

    /// `Loaded → Validated`: parse and validate every envelope.
    pub fn validate(&mut self, now: u64) -> Result<(), KeelError> {
        self.expect_state("Loaded")?;
        let result = self
            .raw_envelopes
            .iter()
            .map(|bytes| Envelope::parse_and_validate(bytes, &self.ctx, now))
            .collect::<Result<Vec<_>, _>>();
        let envelopes = self.transition(result, SessionState::Validated)?;
        debug!(count = envelopes.len(), "session validated");
        self.envelopes = envelopes;
        self.raw_envelopes.clear();
        Ok(())
    }

    /// `Validated → Composed`: build the unsigned plan. Change returns to
    /// the signing key's own address.
    pub fn compose(
        &mut self,
        key: &SecretKey,
        destination: &Address,
        amount: u64,
        fee_policy: FeePolicy,
    ) -> Result<(), KeelError> {
        self.expect_state("Validated")?;
        let change_address = Address::from_public_key(&key.public_key());
        let result = plan_spend(&self.envelopes, &change_address, destination, amount, fee_policy);
        let plan = self.transition(result, SessionState::Composed)?;
        self.plan = Some(plan);
        Ok(())
    }

    /// `Composed → Signed`: sign every input.
    pub fn sign(&mut self, key: &SecretKey) -> Result<(), KeelError> {
        self.expect_state("Composed")?;
        let plan = self.plan.as_ref().expect("Composed state always holds a plan");
        let result = sign_plan(plan, key);
        let signed = self.transition(result, SessionState::Signed)?;
        self.signed = Some(signed);
        Ok(())
    }

    /// `Signed → Emitted`: hand out the final hex. One-shot.
    pub fn emit(&mut self) -> Result<String, KeelError> {
        self.expect_state("Signed")?;
        let hex = self
            .signed
            .as_ref()
            .expect("Signed state always holds a transaction")
            .to_hex();
        self.state = SessionState::Emitted;
        Ok(hex)
    }

    /// The finalized transaction (available from `Signed` onward).
    pub fn signed_transaction(&self) -> Option<&SignedTransaction> {
        self.signed.as_ref()
    }
}
