//! Contract bindings and calldata encoding.

use alloy::primitives::{address, Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::domain::{ClaimDescriptor, SwapLeg};

/// Multicall3 address (same on all EVM chains)
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

// Multicall3 contract interface
sol! {
    #[sol(rpc)]
    contract Multicall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
    }
}

sol! {
    #[allow(missing_docs)]
    interface IRewardDistributor {
        function previewClaim(address account, address token, uint256 epoch) external view returns (uint256);
        function claimMany(address[] calldata tokens, uint256[] calldata epochs) external;
        function claim(address token, uint256 epoch) external;
        function totalStaked() external view returns (uint256);
    }
}

sol! {
    #[allow(missing_docs)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string memory);
    }
}

sol! {
    #[allow(missing_docs)]
    interface ISwapExecutor {
        struct SwapStep {
            uint8 kind;
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint256 minAmountOut;
            address router;
            bytes routerData;
        }

        function executeSwaps(SwapStep[] calldata steps, address recipient) external returns (uint256[] memory amountsOut);
    }
}

pub fn claim_many_selector() -> [u8; 4] {
    IRewardDistributor::claimManyCall::SELECTOR
}

pub fn encode_claim_many(claims: &[ClaimDescriptor]) -> Bytes {
    let (tokens, epochs): (Vec<Address>, Vec<U256>) = claims
        .iter()
        .map(|c| (c.token, c.epoch.as_u256()))
        .unzip();
    IRewardDistributor::claimManyCall { tokens, epochs }
        .abi_encode()
        .into()
}

pub fn encode_claim(claim: &ClaimDescriptor) -> Bytes {
    IRewardDistributor::claimCall {
        token: claim.token,
        epoch: claim.epoch.as_u256(),
    }
    .abi_encode()
    .into()
}

pub fn encode_approve(spender: Address, amount: U256) -> Bytes {
    IERC20::approveCall { spender, amount }.abi_encode().into()
}

pub fn encode_execute_swaps(legs: &[SwapLeg], recipient: Address) -> Bytes {
    let steps = legs
        .iter()
        .map(|leg| ISwapExecutor::SwapStep {
            kind: leg.kind.as_u8(),
            tokenIn: leg.token_in,
            tokenOut: leg.token_out,
            amountIn: leg.amount_in,
            minAmountOut: leg.min_amount_out,
            router: leg.encoded_call.target,
            routerData: leg.encoded_call.data.clone(),
        })
        .collect();
    ISwapExecutor::executeSwapsCall { steps, recipient }
        .abi_encode()
        .into()
}

/// Whether runtime bytecode contains a `PUSH4 <selector>` dispatch entry.
pub fn bytecode_has_selector(code: &[u8], selector: [u8; 4]) -> bool {
    const PUSH4: u8 = 0x63;
    code.windows(5)
        .any(|w| w[0] == PUSH4 && w[1..] == selector)
}
