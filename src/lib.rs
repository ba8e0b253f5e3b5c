pub mod client;
pub mod deployment;
pub mod gateway;
pub mod media;
pub mod provider;
pub mod session;
pub mod ui;
pub mod wallets;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub use gateway::{ContestResult, ContestSnapshot, ContractGateway, Submission, Wei, WinnerRecord};
pub use provider::{ChainAdapter, ChainDescriptor, WalletProvider};
pub use session::Session;

/// ABI surface of the deployed MusicContest contract. Reads are polled;
/// the events are declared for decoding but never subscribed to.
pub mod contest_types {
    use alloy::sol;

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        contract MusicContest {
            struct SubmissionOverview {
                address submitter;
                string musicUrl;
                string theme;
            }

            struct Winner {
                address submitter;
                string musicUrl;
                string theme;
                string prompt;
                uint256 votes;
                uint256 payout;
                uint256 timestamp;
                uint256 voterShare;
            }

            function SUBMISSION_FEE() external view returns (uint256);
            function currentTheme() external view returns (string memory);
            function getSubmissions()
                external
                view
                returns (SubmissionOverview[] memory, uint256, uint256, uint256, address[] memory);
            function getWinners() external view returns (Winner[] memory);
            function submitMusic(string memory _musicUrl, string memory _theme, string memory _prompt)
                external
                payable;
            function vote(uint256 _submissionIndex) external;

            event SubmissionAdded(address indexed submitter, string musicUrl, string theme);
            event Voted(address indexed voter, uint256 indexed submissionIndex);
            event WinnerSelected(
                address indexed winner,
                string musicUrl,
                string theme,
                uint256 votes,
                uint256 payout
            );
            event VoterRewarded(address indexed voter, uint256 reward);
            event FundsDeposited(address indexed depositor, uint256 amount);
        }
    }
}
