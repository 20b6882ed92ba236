//! Transaction metadata handed over by the chain-sync layer
//!
//! These types describe a confirmed transaction the way the registry needs
//! it: who spent the inputs, what the outputs look like, and where the
//! transaction sits in the chain.

use serde::{Serialize, Deserialize};

/// Standard script templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptType {
    /// Pay to public key hash
    PubKeyHash,
    /// Pay to script hash
    ScriptHash,
    /// Pay to a bare public key
    PubKey,
    /// Bare multisig
    Multisig,
    /// OP_RETURN data carrier
    NullData,
    /// Anything else
    NonStandard,
}

/// The output an input spends, as resolved by the chain-sync layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderInfo {
    /// scriptPubKey (hex) of the spent output
    pub script_pubkey: Option<String>,

    /// Template of the spent output
    pub script_type: ScriptType,

    /// Addresses the spent output pays to
    pub addresses: Vec<String>,
}

/// A transaction input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Transaction id of the spent output
    pub prev_txid: String,

    /// Index of the spent output
    pub prev_vout: u32,

    /// scriptSig (hex)
    pub script_sig: Option<String>,
}

/// A transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// scriptPubKey (hex)
    pub script_hex: String,

    /// Value in satoshis
    pub value: u64,
}

/// An unspent output available to fund a new transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unspent {
    /// Transaction id
    pub txid: String,

    /// Output index
    pub vout: u32,

    /// Value in satoshis
    pub value: u64,

    /// scriptPubKey (hex)
    pub script_hex: String,
}

/// Everything the registry learns about one confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionContext {
    /// Transaction id (hex)
    pub txid: String,

    /// Height of the containing block
    pub block_id: u64,

    /// Index of the transaction within its block
    pub vtxindex: u64,

    /// Resolved spent outputs, one per input, in input order
    pub senders: Vec<SenderInfo>,

    /// Inputs, in input order
    pub inputs: Vec<TxInput>,

    /// Outputs, in output order
    pub outputs: Vec<TxOutput>,

    /// Data carried by the OP_RETURN output, framing included
    pub nulldata: Vec<u8>,
}

impl TransactionContext {
    /// The sender whose signature authorizes the operation
    ///
    /// By protocol rule the first input's signer is the operation's
    /// principal; later inputs only contribute funds.
    pub fn principal(&self) -> Option<&SenderInfo> {
        self.senders.first()
    }
}
