// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use rand::Rng;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub use libsecp256k1::{PublicKey, RecoveryId, Signature};

/// Length of a recoverable signature: 64 bytes of `r || s` plus the recovery id.
pub const RECOVERABLE_SIG_LEN: usize = 65;

/// Length of the account digest derived from a public key.
pub const ACCOUNT_DIGEST_LEN: usize = 20;

/// Hash the signing pre-image with Blake2b to the 32 bytes secp256k1 expects.
fn digest(data: &[u8]) -> [u8; 32] {
    blake2b_simd::Params::new()
        .hash_length(32)
        .to_state()
        .update(data)
        .finalize()
        .as_bytes()
        .try_into()
        .expect("blake2b output has the configured length")
}

/// Sign the pre-image, returning the signature with the recovery id appended.
///
/// The recovery id lets verification derive the public key from the signature
/// alone, so the wire format never has to carry the key.
pub fn sign_recoverable(sk: &SecretKey, data: &[u8]) -> [u8; RECOVERABLE_SIG_LEN] {
    let (sig, recovery_id) = sk.sign(&digest(data));

    let mut out = [0u8; RECOVERABLE_SIG_LEN];
    out[..64].copy_from_slice(&sig.serialize());
    out[64] = recovery_id.serialize();
    out
}

/// Recover the public key that signed the pre-image.
pub fn recover(data: &[u8], signature: &[u8]) -> Result<PublicKey, String> {
    if signature.len() != RECOVERABLE_SIG_LEN {
        return Err(format!(
            "invalid recoverable signature length: was {}, must be {}",
            signature.len(),
            RECOVERABLE_SIG_LEN
        ));
    }

    let sig =
        Signature::parse_standard_slice(&signature[..64]).map_err(|e| e.to_string())?;
    let rec_id = RecoveryId::parse(signature[64]).map_err(|e| e.to_string())?;

    let message = libsecp256k1::Message::parse(&digest(data));

    libsecp256k1::recover(&message, &sig, &rec_id).map_err(|e| e.to_string())
}

/// The 20 byte account digest of a public key: Blake2b-160 over the
/// uncompressed serialized form. Account addresses are the hex of this.
pub fn to_account_digest(pk: &PublicKey) -> [u8; ACCOUNT_DIGEST_LEN] {
    blake2b_simd::Params::new()
        .hash_length(ACCOUNT_DIGEST_LEN)
        .to_state()
        .update(&pk.serialize())
        .finalize()
        .as_bytes()
        .try_into()
        .expect("blake2b output has the configured length")
}

/// Wrapper around a [libsecp256k1::SecretKey] that implements [Zeroize].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey(libsecp256k1::SecretKey);

impl SecretKey {
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self(libsecp256k1::SecretKey::random(rng))
    }

    pub fn sign(&self, hash: &[u8; 32]) -> (Signature, RecoveryId) {
        libsecp256k1::sign(&libsecp256k1::Message::parse(hash), &self.0)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(&self.0)
    }

    pub fn serialize(&self) -> Zeroizing<[u8; libsecp256k1::util::SECRET_KEY_SIZE]> {
        Zeroizing::new(self.0.serialize())
    }
}

impl Zeroize for SecretKey {
    fn zeroize(&mut self) {
        let mut sk = libsecp256k1::SecretKey::default();
        std::mem::swap(&mut self.0, &mut sk);
        let mut sk: libsecp256k1::curve::Scalar = sk.into();
        sk.0.zeroize();
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.zeroize()
    }
}

impl ZeroizeOnDrop for SecretKey {}

impl TryFrom<Vec<u8>> for SecretKey {
    type Error = libsecp256k1::Error;

    fn try_from(mut value: Vec<u8>) -> Result<Self, Self::Error> {
        let sk = libsecp256k1::SecretKey::parse_slice(&value)?;
        value.zeroize();
        Ok(Self(sk))
    }
}

impl From<&SecretKey> for PublicKey {
    fn from(value: &SecretKey) -> Self {
        value.public_key()
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;
    use rand::{rngs::StdRng, SeedableRng};

    use super::{recover, sign_recoverable, to_account_digest, SecretKey};

    #[derive(Clone, Debug)]
    struct ArbKey(SecretKey);

    impl Arbitrary for ArbKey {
        fn arbitrary(g: &mut Gen) -> Self {
            let mut rng = StdRng::seed_from_u64(u64::arbitrary(g));
            Self(SecretKey::random(&mut rng))
        }
    }

    #[quickcheck]
    fn prop_sign_and_recover(key: ArbKey, data: Vec<u8>) -> Result<(), String> {
        let pk = key.0.public_key();
        let sig = sign_recoverable(&key.0, &data);
        let rec = recover(&data, &sig)?;

        if to_account_digest(&rec) != to_account_digest(&pk) {
            return Err("recovered key does not match the signer".into());
        }
        Ok(())
    }

    #[quickcheck]
    fn prop_recover_tampered(key: ArbKey, data: Vec<u8>) -> bool {
        let pk = key.0.public_key();
        let sig = sign_recoverable(&key.0, &data);

        let mut tampered = data;
        tampered.push(0xff);

        match recover(&tampered, &sig) {
            // Recovery usually succeeds but yields some other key.
            Ok(rec) => to_account_digest(&rec) != to_account_digest(&pk),
            Err(_) => true,
        }
    }

    #[test]
    fn rejects_short_signature() {
        assert!(recover(b"data", &[0u8; 64]).is_err());
    }
}
