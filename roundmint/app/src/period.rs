// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use roundmint_abci::{request, response, AbciResult, Application};
use roundmint_vm_core::LedgerId;
use roundmint_vm_message::{
    PayloadError, SignatureVerifier, Transaction, TransactionError,
};
use roundmint_vm_period::{AbciApp, AbciAppSpec, ConsensusParams, PeriodState, RoundError};

use crate::block::{BlockBuilder, Blockchain};
use crate::AppError;

/// Outcome of validating raw transaction bytes against the current round.
enum TxOutcome {
    Accepted(Transaction),
    Rejected { code: AppError, info: String },
}

/// Drives one period of the application from the engine's block lifecycle.
///
/// Each engine callback maps onto the round machine: `begin_block` advances
/// block time, `deliver_tx` feeds the current round, `end_block` asks it for
/// a verdict, and `commit` appends the finished block to the local chain.
pub struct Period<V> {
    app: AbciApp,
    blockchain: Blockchain,
    builder: BlockBuilder,
    verifier: V,
    ledger_id: LedgerId,
}

impl<V: SignatureVerifier> Period<V> {
    pub fn new(
        spec: AbciAppSpec,
        params: ConsensusParams,
        state: PeriodState,
        verifier: V,
        ledger_id: LedgerId,
    ) -> Self {
        Self {
            app: AbciApp::new(spec, params, state),
            blockchain: Blockchain::new(),
            builder: BlockBuilder::default(),
            verifier,
            ledger_id,
        }
    }

    /// Initialize the round machine.
    pub fn setup(&mut self) {
        self.app.setup()
    }

    pub fn abci_app(&self) -> &AbciApp {
        &self.app
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    pub fn is_finished(&self) -> bool {
        self.app.is_finished()
    }

    /// Decode, verify and check a transaction without mutating the round.
    ///
    /// Transaction-level failures come back as [`TxOutcome::Rejected`] so the
    /// engine can evict the transaction; internal errors propagate.
    fn validate_tx(&self, tx: &[u8]) -> AbciResult<TxOutcome> {
        let tx = match Transaction::decode(tx) {
            Ok(tx) => tx,
            Err(e) => {
                return Ok(TxOutcome::Rejected {
                    code: decode_code(&e),
                    info: e.to_string(),
                })
            }
        };

        if let Err(e) = tx.verify(&self.verifier, &self.ledger_id) {
            return Ok(TxOutcome::Rejected {
                code: AppError::InvalidSignature,
                info: e.to_string(),
            });
        }

        match self.app.check_transaction(&tx) {
            Ok(()) => Ok(TxOutcome::Accepted(tx)),
            Err(e) => match round_code(&e) {
                Some(code) => Ok(TxOutcome::Rejected {
                    code,
                    info: e.to_string(),
                }),
                None => Err(e.into()),
            },
        }
    }
}

impl<V: SignatureVerifier> Application for Period<V> {
    fn begin_block(&mut self, request: request::BeginBlock) -> AbciResult<response::BeginBlock> {
        if self.app.is_finished() {
            return Err("cannot begin a block, the period has finished".into());
        }
        if self.builder.has_header() {
            return Err("cannot begin a block, one is already in progress".into());
        }

        tracing::debug!(
            height = request.header.height,
            timestamp = request.header.timestamp.as_secs(),
            "begin block"
        );

        self.builder.reset();
        self.builder.set_header(request.header.clone())?;
        self.app.update_time(request.header.timestamp);
        Ok(Default::default())
    }

    fn check_tx(&self, request: request::CheckTx) -> AbciResult<response::CheckTx> {
        match self.validate_tx(&request.tx)? {
            TxOutcome::Accepted(_) => Ok(Default::default()),
            TxOutcome::Rejected { code, info } => Ok(response::CheckTx {
                code: code as u32,
                info,
            }),
        }
    }

    fn deliver_tx(&mut self, request: request::DeliverTx) -> AbciResult<response::DeliverTx> {
        let tx = match self.validate_tx(&request.tx)? {
            TxOutcome::Accepted(tx) => tx,
            TxOutcome::Rejected { code, info } => {
                tracing::info!(code = code as u32, info, "deliver_tx rejected");
                return Ok(response::DeliverTx {
                    code: code as u32,
                    info,
                });
            }
        };

        if let Err(e) = self.app.process_transaction(tx.clone()) {
            return match round_code(&e) {
                Some(code) => {
                    tracing::info!(code = code as u32, info = e.to_string(), "deliver_tx rejected");
                    Ok(response::DeliverTx {
                        code: code as u32,
                        info: e.to_string(),
                    })
                }
                None => Err(e.into()),
            };
        }

        self.builder.add_transaction(tx);
        Ok(Default::default())
    }

    fn end_block(&mut self) -> AbciResult<response::EndBlock> {
        let verdict = self.app.current_round().and_then(|round| round.end_block());
        if let Some((state, event)) = verdict {
            self.app.process_event(event, Some(state));
        }
        Ok(Default::default())
    }

    fn commit(&mut self) -> AbciResult<response::Commit> {
        let block = self.builder.get_block()?;
        self.blockchain.add_block(block)?;
        self.builder.reset();

        let height = self.blockchain.height();
        tracing::debug!(height, "commit");
        Ok(response::Commit { height })
    }
}

/// Response code for bytes that do not decode into a transaction.
fn decode_code(e: &TransactionError) -> AppError {
    match e {
        TransactionError::Payload(PayloadError::TransactionTypeNotRecognized(_)) => {
            AppError::UnknownTransactionType
        }
        _ => AppError::InvalidEncoding,
    }
}

/// Response code for a round-level rejection; `None` marks internal errors
/// that must abort the callback instead.
fn round_code(e: &RoundError) -> Option<AppError> {
    match e {
        RoundError::TransactionTypeNotRecognized { .. } => Some(AppError::UnknownTransactionType),
        RoundError::TransactionNotValid(_) => Some(AppError::TransactionNotValid),
        RoundError::Internal(_) => None,
    }
}
