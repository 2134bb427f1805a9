use std::fmt;

use super::GreeterError;
use crate::config::ProgramIdentity;
use crate::ledger::LedgerTransport;

/// What the operator has to do before the program can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployHint {
    /// The build artifact exists locally but nothing is on the ledger.
    NeedsDeploy,
    NeedsBuildAndDeploy,
}

impl fmt::Display for DeployHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeployHint::NeedsDeploy => "needs to be deployed",
            DeployHint::NeedsBuildAndDeploy => "needs to be built and deployed",
        })
    }
}

/// Check that `program` exists on the ledger and is executable. Read-only.
pub fn verify_program<L: LedgerTransport + ?Sized>(
    ledger: &L,
    program: &ProgramIdentity,
) -> Result<(), GreeterError> {
    match ledger.account(&program.id)? {
        None => Err(GreeterError::ProgramNotDeployed {
            program_id: program.id,
            hint: if program.artifact_present() {
                DeployHint::NeedsDeploy
            } else {
                DeployHint::NeedsBuildAndDeploy
            },
        }),
        Some(account) if !account.executable => Err(GreeterError::ProgramNotExecutable(program.id)),
        Some(_) => Ok(()),
    }
}
