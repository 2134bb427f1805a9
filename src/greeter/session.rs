use std::fmt;

use greeting_core::{create_with_seed, GreetingRecord, Keypair, Pubkey, Signature};

use super::{
    ensure_account, read_greeting, send_greeting, verify_program, FundingGuard, FundingReport, GreeterError,
    ProvisionPolicy, Provisioned, Stage, StageError,
};
use crate::config::ProgramIdentity;
use crate::ledger::{ConnectionInfo, LedgerTransport};

/// Progress of a [`Session`]. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Disconnected,
    Connected,
    PayerReady,
    ProgramVerified,
    AccountReady,
    Greeted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::PayerReady => "payer-ready",
            SessionState::ProgramVerified => "program-verified",
            SessionState::AccountReady => "account-ready",
            SessionState::Greeted => "greeted",
        })
    }
}

/// What a full [`Session::run`] observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub connection: ConnectionInfo,
    pub funding: FundingReport,
    pub account: Provisioned,
    pub signature: Signature,
    pub record: GreetingRecord,
}

/// One payer greeting one program through one ledger connection.
///
/// Everything a run needs lives here rather than in globals, so two sessions
/// never share state. Stages must be called in order; calling one early or
/// twice fails with [`GreeterError::OutOfSequence`] and leaves the state as
/// it was.
pub struct Session<L> {
    ledger: L,
    payer: Keypair,
    program: ProgramIdentity,
    seed: String,
    policy: ProvisionPolicy,
    funding: FundingGuard,
    state: SessionState,
    address: Option<Pubkey>,
}

impl<L: LedgerTransport> Session<L> {
    pub fn new(ledger: L, payer: Keypair, program: ProgramIdentity, seed: impl Into<String>) -> Self {
        Self {
            ledger,
            payer,
            program,
            seed: seed.into(),
            policy: ProvisionPolicy::default(),
            funding: FundingGuard::default(),
            state: SessionState::Disconnected,
            address: None,
        }
    }

    pub fn with_policy(mut self, policy: ProvisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn into_ledger(self) -> L {
        self.ledger
    }

    pub fn payer(&self) -> &Keypair {
        &self.payer
    }

    pub fn program(&self) -> &ProgramIdentity {
        &self.program
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The greeting account, once provisioned or derived for a read.
    pub fn address(&self) -> Option<Pubkey> {
        self.address
    }

    fn require_state(&self, stage: Stage, allowed: &[SessionState]) -> Result<(), StageError> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(StageError::new(
            stage,
            GreeterError::OutOfSequence {
                state: self.state,
                expected: allowed[0],
            },
        ))
    }

    pub fn connect(&mut self) -> Result<ConnectionInfo, StageError> {
        self.require_state(Stage::Connect, &[SessionState::Disconnected])?;
        let info = self
            .ledger
            .connection_info()
            .map_err(|e| StageError::new(Stage::Connect, e))?;
        self.state = SessionState::Connected;
        Ok(info)
    }

    pub fn establish_payer(&mut self) -> Result<FundingReport, StageError> {
        self.require_state(Stage::EstablishPayer, &[SessionState::Connected])?;
        let report = self
            .funding
            .ensure_funded(&mut self.ledger, &self.payer.pubkey())
            .map_err(|e| StageError::new(Stage::EstablishPayer, e))?;
        self.state = SessionState::PayerReady;
        Ok(report)
    }

    /// Read-only sessions may verify straight after connecting and skip
    /// funding.
    pub fn verify_program(&mut self) -> Result<(), StageError> {
        self.require_state(
            Stage::VerifyProgram,
            &[SessionState::PayerReady, SessionState::Connected],
        )?;
        verify_program(&self.ledger, &self.program).map_err(|e| StageError::new(Stage::VerifyProgram, e))?;
        self.state = SessionState::ProgramVerified;
        Ok(())
    }

    pub fn provision_account(&mut self) -> Result<Provisioned, StageError> {
        self.require_state(Stage::ProvisionAccount, &[SessionState::ProgramVerified])?;
        let provisioned = ensure_account(&mut self.ledger, &self.payer, &self.seed, &self.program.id, self.policy)
            .map_err(|e| StageError::new(Stage::ProvisionAccount, e))?;
        self.address = Some(provisioned.address);
        self.state = SessionState::AccountReady;
        Ok(provisioned)
    }

    pub fn greet(&mut self, message: &str) -> Result<Signature, StageError> {
        self.require_state(Stage::Greet, &[SessionState::AccountReady])?;
        let address = self.require_address(Stage::Greet)?;
        let signature = send_greeting(&mut self.ledger, &address, &self.program.id, &self.payer, message)
            .map_err(|e| StageError::new(Stage::Greet, e))?;
        self.state = SessionState::Greeted;
        Ok(signature)
    }

    /// Fetch the stored record. Does not change state. Before provisioning the
    /// address is derived on the spot.
    pub fn read(&mut self) -> Result<GreetingRecord, StageError> {
        self.require_state(
            Stage::Report,
            &[
                SessionState::ProgramVerified,
                SessionState::AccountReady,
                SessionState::Greeted,
            ],
        )?;
        let address = match self.address {
            Some(address) => address,
            None => {
                let derived = create_with_seed(&self.payer.pubkey(), &self.seed, &self.program.id)
                    .map_err(|e| StageError::new(Stage::Report, e))?;
                self.address = Some(derived);
                derived
            }
        };
        read_greeting(&self.ledger, &address).map_err(|e| StageError::new(Stage::Report, e))
    }

    /// Connect, fund, verify, provision, greet once and read the result back.
    pub fn run(&mut self, message: &str) -> Result<RunReport, StageError> {
        let connection = self.connect()?;
        let funding = self.establish_payer()?;
        self.verify_program()?;
        let account = self.provision_account()?;
        let signature = self.greet(message)?;
        let record = self.read()?;
        Ok(RunReport {
            connection,
            funding,
            account,
            signature,
            record,
        })
    }

    fn require_address(&self, stage: Stage) -> Result<Pubkey, StageError> {
        self.address.ok_or_else(|| {
            StageError::new(
                stage,
                GreeterError::OutOfSequence {
                    state: self.state,
                    expected: SessionState::AccountReady,
                },
            )
        })
    }
}
