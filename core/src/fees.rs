//! Fee policy and output-shape checks
//!
//! Every registry transaction pays a dust fee that scales with its input
//! count plus a flat fee for the data carrier. Operation types may also
//! burn a per-type fee; that amount is a constant of the operation, not
//! something derived here.

use serde::{Serialize, Deserialize};

use crate::error::{CoreError, Result};
use crate::models::{Fees, TxOutput, Unspent};
use crate::script;

/// Dust fee charged per input (and once for the change output)
pub const DEFAULT_DUST_FEE: u64 = 5500;

/// Flat fee for the OP_RETURN data carrier
pub const DEFAULT_OP_RETURN_FEE: u64 = 10000;

/// Fee constants, injected into each operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    /// Dust fee per input
    pub dust_fee_per_input: u64,

    /// Flat data carrier fee
    pub op_return_fee: u64,
}

impl Default for FeePolicy {
    fn default() -> Self {
        FeePolicy {
            dust_fee_per_input: DEFAULT_DUST_FEE,
            op_return_fee: DEFAULT_OP_RETURN_FEE,
        }
    }
}

impl FeePolicy {
    /// Dust fee for a transaction with `num_inputs` inputs
    pub fn dust_fee(&self, num_inputs: usize) -> u64 {
        (num_inputs as u64 + 1)
            .saturating_mul(self.dust_fee_per_input)
            .saturating_add(self.op_return_fee)
    }

    /// Fees of a `[data carrier, change]` transaction
    ///
    /// Returns `None` when the outputs do not have that shape; the
    /// transaction then does not encode a well-formed operation.
    pub fn carrier_fees(&self, num_inputs: usize, outputs: &[TxOutput], op_fee: u64) -> Option<Fees> {
        if !check_carrier_outputs(outputs) {
            return None;
        }

        Some(Fees {
            dust_fee: self.dust_fee(num_inputs),
            op_fee,
        })
    }
}

/// Check the `[zero-value OP_RETURN, change]` output shape
pub fn check_carrier_outputs(outputs: &[TxOutput]) -> bool {
    let [carrier, change] = outputs else {
        return false;
    };

    script::is_op_return_script(&carrier.script_hex)
        && carrier.value == 0
        && script::script_hex_to_address(&change.script_hex).is_some()
}

/// Change left after paying `send_amount` and `fee` out of `inputs`
pub fn calculate_change_amount(inputs: &[Unspent], send_amount: u64, fee: u64) -> Result<u64> {
    let available = inputs
        .iter()
        .try_fold(0u64, |total, u| total.checked_add(u.value))
        .ok_or_else(|| CoreError::InvalidInput("Unspent outputs overflow the amount range".to_string()))?;
    let required = send_amount.saturating_add(fee);

    available
        .checked_sub(required)
        .ok_or(CoreError::InsufficientFunds { available, required })
}

/// Build the `[data carrier, change]` outputs of a registry transaction
///
/// With `pay_fee` unset the change output returns everything, which is
/// what a subsidizing party signing later expects to adjust.
pub fn make_outputs(
    policy: &FeePolicy,
    data: &[u8],
    inputs: &[Unspent],
    change_address: &str,
    pay_fee: bool,
) -> Result<Vec<TxOutput>> {
    let fee = if pay_fee { policy.dust_fee(inputs.len()) } else { 0 };

    Ok(vec![
        TxOutput {
            script_hex: script::make_op_return_script(data)?,
            value: 0,
        },
        TxOutput {
            script_hex: script::make_pay_to_address_script(change_address)?,
            value: calculate_change_amount(inputs, 0, fee)?,
        },
    ])
}
