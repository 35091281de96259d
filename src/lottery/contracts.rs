//! ABI bindings for the lottery contracts the backend drives.

use alloy::sol;

sol! {
    /// Per-lottery manager contract.
    interface ILotteryManager {
        function getState() external view returns (uint8);
        function transState(uint8 state) external;
        function rolloutCallback(uint256[] results) external;
    }

    /// LOT token: ticket purchases and stablecoin swap configuration.
    interface ILOTToken {
        function buy(address placeAddr, uint256 _amount, uint256[] target) external;
        function setStablecoin(address stablecoin, string name, uint256 rate, address receiver) external;
        function removeStablecoin(address stablecoin) external;
    }

    /// Randomness contract that calls back into a lottery manager.
    interface ISimpleRollout {
        function rolloutCall(address rolloutcb) external;
    }
}

/// On-chain lifecycle state of a lottery manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LotteryState {
    Ready = 0,
    Distribute = 1,
    Rollout = 2,
    Terminal = 3,
}

impl LotteryState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for LotteryState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LotteryState::Ready),
            1 => Ok(LotteryState::Distribute),
            2 => Ok(LotteryState::Rollout),
            3 => Ok(LotteryState::Terminal),
            other => Err(other),
        }
    }
}
