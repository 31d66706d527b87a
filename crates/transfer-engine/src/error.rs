use thiserror::Error;

/// Errors raised by the ledger itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("account index {index} out of range for ledger of {len} accounts")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("total funds overflow: {accounts} accounts with {initial_amount} each")]
    TotalOverflow { accounts: usize, initial_amount: u64 },

    #[error("balance sum overflowed while scanning accounts")]
    SumOverflow,
}

/// Errors from a single reporter tick
#[derive(Error, Debug)]
pub enum ReporterError {
    #[error("snapshot failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("failed to write stats record: {0}")]
    Output(#[from] csv::Error),

    #[error("failed to flush stats output: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that prevent a simulation from starting
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("at least one worker is required")]
    NoWorkers,

    #[error("report interval must be greater than zero")]
    ZeroReportInterval,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
}
