//! Receipt types returned by relay operations.
//!
//! Uploads, funding transfers, and withdrawals each produce a small receipt
//! the caller can surface or persist. Amounts stay as decimal strings to
//! avoid committing to one chain's numeric width.

use crate::Address;
use serde::{Deserialize, Serialize};

/// Gateway used to build a public URL for an uploaded item.
pub const GATEWAY_BASE_URL: &str = "https://arweave.net";

/// Receipt for a completed upload request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
	/// Identifier of the stored item on the relay network.
	pub id: String,
	/// HTTP-style status the relay answered with.
	pub status: u16,
}

impl UploadReceipt {
	/// Whether the relay accepted the upload.
	pub fn is_success(&self) -> bool {
		self.status == 200 || self.status == 201
	}

	/// Public gateway URL for the uploaded item.
	pub fn gateway_url(&self) -> String {
		format!("{}/{}", GATEWAY_BASE_URL, self.id)
	}
}

/// Receipt for a funding transfer into the relay balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundReceipt {
	/// The relay-side account the funds were credited to.
	pub target: Address,
	/// Identifier of the funding transaction.
	pub id: String,
}

/// Receipt for a withdrawal from the relay balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawReceipt {
	/// Identifier of the withdrawal transaction.
	pub tx_id: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_upload_receipt_success_statuses() {
		for status in [200, 201] {
			let receipt = UploadReceipt {
				id: "abc".to_string(),
				status,
			};
			assert!(receipt.is_success(), "status {status} should be success");
		}
		for status in [199, 202, 400, 500] {
			let receipt = UploadReceipt {
				id: "abc".to_string(),
				status,
			};
			assert!(!receipt.is_success(), "status {status} should not be success");
		}
	}

	#[test]
	fn test_upload_receipt_gateway_url() {
		let receipt = UploadReceipt {
			id: "tx123".to_string(),
			status: 200,
		};
		assert_eq!(receipt.gateway_url(), "https://arweave.net/tx123");
	}
}
