pub mod clock;
pub mod config;
pub mod crypto;
pub mod emulator;
pub mod ledger;
pub mod tx_mining;
pub mod wallet;

pub use clock::SystemClockAdapter;
pub use config::{RuntimeProfile, SendAdapterConfig};
pub use emulator::LedgerEmulator;
pub use ledger::{DeviceEvents, DeviceSubscription, LedgerChannelAdapter};
pub use tx_mining::TxMiningAdapter;
pub use wallet::{MemoryWalletAdapter, Utxo, WalletFixture};
