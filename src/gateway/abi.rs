//! Contract interfaces for the router, quoter and ERC-20 calls this crate makes.
use alloy_primitives::Bytes;
use alloy_sol_types::{sol, Revert, SolCall, SolError};
use anyhow::{anyhow, Result};

sol! {
    interface IERC20 {
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address owner) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    interface IUniswapV2Router02 {
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
        function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external returns (uint256[] memory amounts);
        function swapExactETHForTokens(uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external payable returns (uint256[] memory amounts);
        function swapExactTokensForETH(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external returns (uint256[] memory amounts);
        function swapExactTokensForTokensSupportingFeeOnTransferTokens(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external;
        function swapExactETHForTokensSupportingFeeOnTransferTokens(uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external payable;
        function swapExactTokensForETHSupportingFeeOnTransferTokens(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external;
    }

    interface IQuoter {
        function quoteExactInputSingle(address tokenIn, address tokenOut, uint24 fee, uint256 amountIn, uint160 sqrtPriceLimitX96) external returns (uint256 amountOut);
    }

    interface ISwapRouter {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 deadline;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams calldata params) external payable returns (uint256 amountOut);
    }
}

/// Calldata for `call`, selector included.
pub fn encode<C: SolCall>(call: C) -> Bytes {
    Bytes::from(call.abi_encode())
}

/// `symbol()` result. Some older tokens (MKR, SAI) return `bytes32` instead
/// of `string`; that is accepted and trimmed of trailing zero bytes.
pub fn decode_symbol(data: &[u8]) -> Result<String> {
    match IERC20::symbolCall::abi_decode_returns(data, true) {
        Ok(ret) => Ok(ret._0),
        Err(_) if data.len() == 32 => {
            let trimmed: Vec<u8> = data.iter().copied().take_while(|b| *b != 0).collect();
            String::from_utf8(trimmed).map_err(|e| anyhow!("bytes32 symbol is not utf-8: {}", e))
        }
        Err(e) => Err(anyhow!("invalid symbol() return: {}", e)),
    }
}

/// Reason string of a standard `Error(string)` revert payload.
pub fn revert_reason(data: &[u8]) -> Option<String> {
    Revert::abi_decode(data, true).ok().map(|revert| revert.reason)
}
