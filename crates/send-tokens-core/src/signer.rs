use crate::domain::{SignerPath, WalletKind};

pub fn select_path(kind: WalletKind) -> SignerPath {
    match kind {
        WalletKind::Software => SignerPath::Software,
        WalletKind::Hardware => SignerPath::Hardware,
    }
}
