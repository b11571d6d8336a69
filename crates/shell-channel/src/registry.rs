use std::collections::HashMap;
use std::sync::RwLock;

use tracing::info;

use shell_core::error::ShellError;
use shell_core::types::{Hash256, OutPoint, PubKey};
use shell_crypto::keys::verify_signature;

use crate::channel::{derive_channel_id, ChannelUpdate, PaymentChannel};

/// Final balances handed back for on-chain settlement when a channel
/// closes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClosureSummary {
    pub balances: [u64; 2],
    pub nonce: u64,
}

#[derive(Default)]
struct Inner {
    channels: HashMap<Hash256, PaymentChannel>,
    /// Funding UTXO → channel, detached on close.
    by_outpoint: HashMap<OutPoint, Hash256>,
}

/// Process-wide channel state: channel-ID map plus the parallel
/// funding-outpoint index. Single writer per logical transaction (the
/// block validator); concurrent readers take the shared lock.
#[derive(Default)]
pub struct ChannelRegistry {
    inner: RwLock<Inner>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a channel funded by `funding`. The full capacity starts with
    /// participant 0 (the opener); the nonce starts at zero.
    pub fn open(
        &self,
        alice: PubKey,
        bob: PubKey,
        capacity: u64,
        funding: OutPoint,
        expiry: u32,
    ) -> Result<Hash256, ShellError> {
        if capacity == 0 {
            return Err(ShellError::ZeroCapacity);
        }
        if alice.is_null() || bob.is_null() {
            return Err(ShellError::AbsentParticipant);
        }
        let channel_id = derive_channel_id(&alice, &bob, &funding);

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.channels.contains_key(&channel_id) {
            return Err(ShellError::DuplicateChannel(channel_id.to_hex()));
        }
        inner.channels.insert(
            channel_id,
            PaymentChannel {
                channel_id,
                participants: [alice, bob],
                capacity,
                balances: [capacity, 0],
                nonce: 0,
                expiry,
                is_open: true,
            },
        );
        inner.by_outpoint.insert(funding, channel_id);
        info!(channel = %channel_id, capacity, "channel opened");
        Ok(channel_id)
    }

    /// Apply a co-signed state update. Validation order: existence, open,
    /// strict nonce advance, capacity conservation, then both signatures
    /// over the canonical encoding. On success balances and nonce are
    /// replaced atomically; the superseded state is permanently obsolete.
    pub fn apply_update(&self, update: &ChannelUpdate) -> Result<(), ShellError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let channel = inner
            .channels
            .get_mut(&update.channel_id)
            .ok_or_else(|| ShellError::ChannelNotFound(update.channel_id.to_hex()))?;

        if !channel.is_open {
            return Err(ShellError::ChannelClosed);
        }
        if update.nonce <= channel.nonce {
            return Err(ShellError::StaleNonce {
                current: channel.nonce,
                got: update.nonce,
            });
        }
        let (b0, b1) = (update.balances[0], update.balances[1]);
        if b0.checked_add(b1) != Some(channel.capacity) {
            return Err(ShellError::BalanceMismatch {
                b0,
                b1,
                capacity: channel.capacity,
            });
        }

        let payload = update.signing_bytes();
        for (i, participant) in channel.participants.iter().enumerate() {
            let sig = update.signatures[i].ok_or(ShellError::MissingSignature(i))?;
            if !verify_signature(participant, &payload, &sig) {
                return Err(ShellError::BadSignature(i));
            }
        }

        channel.balances = update.balances;
        channel.nonce = update.nonce;
        Ok(())
    }

    /// Close a channel: one-way. The outpoint mapping is removed (the
    /// funding UTXO is being spent); the record is retained for history.
    /// Reopening requires a fresh funding outpoint and hence a new ID.
    pub fn close(&self, channel_id: &Hash256) -> Result<ClosureSummary, ShellError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let channel = inner
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| ShellError::ChannelNotFound(channel_id.to_hex()))?;
        if !channel.is_open {
            return Err(ShellError::ChannelClosed);
        }
        channel.is_open = false;
        let summary = ClosureSummary {
            balances: channel.balances,
            nonce: channel.nonce,
        };
        inner.by_outpoint.retain(|_, id| id != channel_id);
        info!(channel = %channel_id, nonce = summary.nonce, "channel closed");
        Ok(summary)
    }

    pub fn get(&self, channel_id: &Hash256) -> Option<PaymentChannel> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.channels.get(channel_id).cloned()
    }

    /// Look up a channel via its funding UTXO.
    pub fn by_outpoint(&self, outpoint: &OutPoint) -> Option<PaymentChannel> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let id = inner.by_outpoint.get(outpoint)?;
        inner.channels.get(id).cloned()
    }

    pub fn open_channel_count(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.channels.values().filter(|c| c.is_open).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shell_crypto::keys::Keypair;

    fn funding(tag: u8) -> OutPoint {
        OutPoint {
            txid: Hash256::from_bytes([tag; 32]),
            vout: 0,
        }
    }

    fn open_test_channel(
        registry: &ChannelRegistry,
        capacity: u64,
    ) -> (Hash256, Keypair, Keypair) {
        let alice = Keypair::from_secret_bytes([0x11; 32]).unwrap();
        let bob = Keypair::from_secret_bytes([0x22; 32]).unwrap();
        let id = registry
            .open(
                alice.public_key(),
                bob.public_key(),
                capacity,
                funding(7),
                500_000,
            )
            .unwrap();
        (id, alice, bob)
    }

    fn signed_update(
        id: Hash256,
        balances: [u64; 2],
        nonce: u64,
        alice: &Keypair,
        bob: &Keypair,
    ) -> ChannelUpdate {
        let mut update = ChannelUpdate {
            channel_id: id,
            balances,
            nonce,
            signatures: [None, None],
        };
        let payload = update.signing_bytes();
        update.signatures = [Some(alice.sign(&payload)), Some(bob.sign(&payload))];
        update
    }

    #[test]
    fn open_rejects_zero_capacity_and_null_keys() {
        let registry = ChannelRegistry::new();
        let kp = Keypair::generate();
        assert_eq!(
            registry
                .open(kp.public_key(), kp.public_key(), 0, funding(1), 0)
                .unwrap_err(),
            ShellError::ZeroCapacity
        );
        assert_eq!(
            registry
                .open(kp.public_key(), PubKey::from_bytes([0; 33]), 10, funding(1), 0)
                .unwrap_err(),
            ShellError::AbsentParticipant
        );
    }

    #[test]
    fn open_places_capacity_with_opener() {
        let registry = ChannelRegistry::new();
        let (id, _, _) = open_test_channel(&registry, 1_000);
        let ch = registry.get(&id).unwrap();
        assert_eq!(ch.balances, [1_000, 0]);
        assert_eq!(ch.nonce, 0);
        assert!(ch.is_open);
    }

    #[test]
    fn duplicate_open_rejected() {
        let registry = ChannelRegistry::new();
        let (_, alice, bob) = open_test_channel(&registry, 1_000);
        let err = registry
            .open(alice.public_key(), bob.public_key(), 1_000, funding(7), 0)
            .unwrap_err();
        assert!(matches!(err, ShellError::DuplicateChannel(_)));
    }

    #[test]
    fn update_sequence_conserves_capacity() {
        let registry = ChannelRegistry::new();
        let (id, alice, bob) = open_test_channel(&registry, 1_000);

        for (nonce, balances) in [(1, [700, 300]), (2, [650, 350]), (5, [100, 900])] {
            registry
                .apply_update(&signed_update(id, balances, nonce, &alice, &bob))
                .unwrap();
            let ch = registry.get(&id).unwrap();
            assert_eq!(ch.balances[0] + ch.balances[1], ch.capacity);
        }
        assert_eq!(registry.get(&id).unwrap().nonce, 5);
    }

    #[test]
    fn stale_nonce_rejected() {
        let registry = ChannelRegistry::new();
        let (id, alice, bob) = open_test_channel(&registry, 1_000);

        registry
            .apply_update(&signed_update(id, [700, 300], 1, &alice, &bob))
            .unwrap();
        let err = registry
            .apply_update(&signed_update(id, [500, 500], 1, &alice, &bob))
            .unwrap_err();
        assert_eq!(err, ShellError::StaleNonce { current: 1, got: 1 });
    }

    #[test]
    fn non_conserving_update_rejected() {
        let registry = ChannelRegistry::new();
        let (id, alice, bob) = open_test_channel(&registry, 1_000);
        let err = registry
            .apply_update(&signed_update(id, [700, 200], 1, &alice, &bob))
            .unwrap_err();
        assert_eq!(
            err,
            ShellError::BalanceMismatch {
                b0: 700,
                b1: 200,
                capacity: 1_000
            }
        );
    }

    #[test]
    fn missing_and_bad_signatures_rejected() {
        let registry = ChannelRegistry::new();
        let (id, alice, bob) = open_test_channel(&registry, 1_000);

        let mut update = signed_update(id, [700, 300], 1, &alice, &bob);
        update.signatures[1] = None;
        assert_eq!(
            registry.apply_update(&update).unwrap_err(),
            ShellError::MissingSignature(1)
        );

        // Bob's signature forged by a third party.
        let mallory = Keypair::generate();
        let mut update = signed_update(id, [700, 300], 1, &alice, &bob);
        update.signatures[1] = Some(mallory.sign(&update.signing_bytes()));
        assert_eq!(
            registry.apply_update(&update).unwrap_err(),
            ShellError::BadSignature(1)
        );
    }

    #[test]
    fn signature_covers_balances_and_nonce() {
        let registry = ChannelRegistry::new();
        let (id, alice, bob) = open_test_channel(&registry, 1_000);

        // Sign one state, then tamper with the balances.
        let mut update = signed_update(id, [700, 300], 1, &alice, &bob);
        update.balances = [300, 700];
        assert_eq!(
            registry.apply_update(&update).unwrap_err(),
            ShellError::BadSignature(0)
        );
    }

    #[test]
    fn close_is_one_way_and_detaches_outpoint() {
        let registry = ChannelRegistry::new();
        let (id, alice, bob) = open_test_channel(&registry, 1_000);
        registry
            .apply_update(&signed_update(id, [700, 300], 1, &alice, &bob))
            .unwrap();

        let summary = registry.close(&id).unwrap();
        assert_eq!(summary.balances, [700, 300]);
        assert_eq!(summary.nonce, 1);

        assert!(registry.by_outpoint(&funding(7)).is_none());
        assert_eq!(registry.close(&id).unwrap_err(), ShellError::ChannelClosed);
        assert_eq!(
            registry
                .apply_update(&signed_update(id, [500, 500], 2, &alice, &bob))
                .unwrap_err(),
            ShellError::ChannelClosed
        );
    }

    #[test]
    fn outpoint_lookup_finds_channel() {
        let registry = ChannelRegistry::new();
        let (id, _, _) = open_test_channel(&registry, 1_000);
        assert_eq!(registry.by_outpoint(&funding(7)).unwrap().channel_id, id);
    }
}
