//! ABI bindings for the three contracts the joiner touches.

use alloy_sol_types::sol;

sol! {
    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    interface ILinearPool {
        function getMainToken() external view returns (address);
        function getWrappedToken() external view returns (address);
        function getPoolId() external view returns (bytes32);
    }

    interface IVault {
        struct BatchSwapStep {
            bytes32 poolId;
            uint256 assetInIndex;
            uint256 assetOutIndex;
            uint256 amount;
            bytes userData;
        }

        struct FundManagement {
            address sender;
            bool fromInternalBalance;
            address recipient;
            bool toInternalBalance;
        }

        function batchSwap(
            uint8 kind,
            BatchSwapStep[] swaps,
            address[] assets,
            FundManagement funds,
            int256[] limits,
            uint256 deadline
        ) external payable returns (int256[] assetDeltas);
    }
}
