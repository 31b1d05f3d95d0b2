#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::B256;
use semver::Version;

use send_tokens_adapters::{
    DeviceEvents, LedgerChannelAdapter, LedgerEmulator, MemoryWalletAdapter, TxMiningAdapter,
    Utxo, WalletFixture,
};
use send_tokens_core::{
    ClockPort, OutputSpec, Orchestrator, PortError, SendOutcome, SendSettings, SubFormData,
    TokenConfig, WalletKind,
};

pub const PIN: &str = "123456";
pub const OWN_ADDRESS: &str = "WZ7pDnkPnxbs14GHdUFivFzPbzitwNtvZo";
pub const CHANGE_ADDRESS_1: &str = "WewDeXWyvHP7jJTs7tjLoQfoB72LLxJQqN";
pub const CHANGE_ADDRESS_2: &str = "WYBwT3xLpDnHNtYZiU52oanupVeDKhAvNp";
pub const SPARE_ADDRESS: &str = "WTjhJXzQJETVx7BVXdyZmvk396DRRsubdw";
pub const DEST_ADDRESS: &str = "WPynsVhyU6nP7RSZAkqfijEutC88KgAyFc";

pub const TOKEN_KEY: &[u8] = b"ledger-token-verification-key";
pub const TOKEN_A_UID: &str = "00000000f76262bb1cca969d952ac2f0e85f88ec34c31f26a13eb3c31e29d4ed";
pub const TOKEN_B_UID: &str = "0000000077f4f2ed64e07b8b0e29b2a1d6c3a4e0a4e3c9c1e8d2f0b6a9c7e5d3";

pub fn token_a() -> TokenConfig {
    TokenConfig::new(TOKEN_A_UID, "TST", "Test Token")
}

pub fn token_b() -> TokenConfig {
    TokenConfig::new(TOKEN_B_UID, "BRN", "Burn Token")
}

#[derive(Debug, Default)]
pub struct TestClock {
    now: AtomicU64,
}

impl ClockPort for TestClock {
    fn now_ms(&self) -> Result<u64, PortError> {
        Ok(self.now.fetch_add(1, Ordering::SeqCst) + 1_739_750_400_000)
    }
}

fn utxo(seed: u8, token: &str, value: u64) -> Utxo {
    Utxo {
        tx_id: B256::repeat_byte(seed),
        index: 0,
        token: token.to_owned(),
        value,
        address: OWN_ADDRESS.to_owned(),
    }
}

/// 150 HTR over two outputs, 30 TST and 10 BRN, change going to the pool
/// from index 1.
pub fn wallet_fixture(kind: WalletKind) -> WalletFixture {
    WalletFixture {
        kind,
        pin: PIN.to_owned(),
        tokens: vec![TokenConfig::primary(), token_a(), token_b()],
        addresses: vec![
            OWN_ADDRESS.to_owned(),
            CHANGE_ADDRESS_1.to_owned(),
            CHANGE_ADDRESS_2.to_owned(),
            SPARE_ADDRESS.to_owned(),
        ],
        current_address_index: 1,
        utxos: vec![
            utxo(0x01, "00", 100),
            utxo(0x02, "00", 50),
            utxo(0x03, TOKEN_A_UID, 30),
            utxo(0x04, TOKEN_B_UID, 10),
        ],
        token_signatures: Default::default(),
        parents: vec![B256::repeat_byte(0xaa), B256::repeat_byte(0xbb)],
        network_ready: true,
    }
}

pub fn new_wallet(fixture: WalletFixture) -> MemoryWalletAdapter {
    MemoryWalletAdapter::from_fixture(fixture, 1_000)
        .expect("wallet fixture")
        .with_clock(TestClock::default())
}

pub fn emulator(firmware: Version) -> LedgerEmulator {
    LedgerEmulator::new(firmware, TOKEN_KEY)
}

pub type TestOrchestrator =
    Orchestrator<MemoryWalletAdapter, LedgerChannelAdapter, TxMiningAdapter, TestClock>;

/// Orchestrator plus handles onto the shared adapter state.
pub struct Harness {
    pub orch: TestOrchestrator,
    pub wallet: MemoryWalletAdapter,
    pub device: LedgerChannelAdapter,
    pub events: DeviceEvents,
    pub mining: TxMiningAdapter,
}

impl Harness {
    pub fn new(
        wallet: MemoryWalletAdapter,
        emulator: LedgerEmulator,
        mining: TxMiningAdapter,
        settings: SendSettings,
    ) -> Self {
        let (device, events) = LedgerChannelAdapter::emulated(emulator);
        let orch = Orchestrator::new(
            wallet.clone(),
            device.clone(),
            mining.clone(),
            TestClock::default(),
            settings,
        );
        Self {
            orch,
            wallet,
            device,
            events,
            mining,
        }
    }

    pub fn software() -> Self {
        Self::new(
            new_wallet(wallet_fixture(WalletKind::Software)),
            emulator(Version::new(1, 1, 0)),
            TxMiningAdapter::in_memory(),
            SendSettings::default(),
        )
    }

    pub fn hardware(emulator: LedgerEmulator) -> Self {
        Self::new(
            new_wallet(wallet_fixture(WalletKind::Hardware)),
            emulator,
            TxMiningAdapter::in_memory(),
            SendSettings::default(),
        )
    }

    /// Feeds every queued device reply to the orchestrator, including the
    /// replies those calls provoke.
    pub fn pump(&mut self) -> Vec<SendOutcome> {
        let mut outcomes = Vec::new();
        while let Some(message) = self.events.try_next() {
            outcomes.push(
                self.orch
                    .on_device_message(message)
                    .expect("device message handled"),
            );
        }
        outcomes
    }

    pub fn verify_token(&self, token: &TokenConfig, emulator: &LedgerEmulator) {
        let signature = emulator.sign_token(token).expect("sign token");
        self.wallet
            .insert_token_signature(&token.uid, signature)
            .expect("insert token signature");
    }
}

pub fn pay(token: &str, value: u64) -> SubFormData {
    SubFormData {
        inputs: Vec::new(),
        outputs: vec![OutputSpec {
            address: DEST_ADDRESS.to_owned(),
            value,
            token: token.to_owned(),
            is_change: false,
        }],
    }
}
