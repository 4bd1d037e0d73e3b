//! Trust checks: manifest signatures and shard digests.
//!
//! Both checks are pure reads. They answer yes or no so callers can treat every
//! kind of untrusted input the same way.

use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature};
use crate::error::{CoreError, Result};
use crate::manifest::ManifestEntry;

/// Check a manifest signature.
///
/// Returns true iff `signature` is a valid Ed25519 signature over exactly
/// `manifest_bytes` under `public_key`. A wrong key, tampered bytes, a
/// signature of the wrong length or an unusable key all return false.
pub fn verify_manifest(manifest_bytes: &[u8], signature: &[u8], public_key: &Ed25519PublicKey) -> bool {
    let Some(signature) = Ed25519Signature::from_slice(signature) else {
        return false;
    };
    public_key.verify(manifest_bytes, &signature).is_ok()
}

/// Check shard bytes against their manifest entry.
///
/// Both the byte length and the digest must match.
pub fn verify_shard(shard_bytes: &[u8], expected: &ManifestEntry) -> bool {
    check_shard(shard_bytes, expected).is_ok()
}

/// Like [`verify_shard`], but says what did not match.
pub fn check_shard(shard_bytes: &[u8], expected: &ManifestEntry) -> Result<()> {
    let actual_len = shard_bytes.len() as u64;
    if actual_len != expected.byte_length {
        return Err(CoreError::LengthMismatch {
            expected: expected.byte_length,
            actual: actual_len,
        });
    }

    let actual = Blake3Hash::hash(shard_bytes);
    if actual != expected.digest {
        return Err(CoreError::DigestMismatch {
            expected: expected.digest.to_hex(),
            actual: actual.to_hex(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::manifest::{build_manifest, sign_manifest};
    use proptest::prelude::*;

    fn signed_manifest() -> (Vec<u8>, Vec<u8>, Keypair) {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let manifest = build_manifest([
            ("shard_A.bin", b"alpha".as_slice()),
            ("shard_Z.bin", b"zulu".as_slice()),
        ])
        .unwrap();
        let bytes = manifest.to_bytes();
        let signature = sign_manifest(&bytes, &keypair).as_bytes().to_vec();
        (bytes, signature, keypair)
    }

    #[test]
    fn test_valid_manifest_verifies() {
        let (bytes, signature, keypair) = signed_manifest();
        assert!(verify_manifest(&bytes, &signature, &keypair.public_key()));
    }

    #[test]
    fn test_wrong_key_fails() {
        let (bytes, signature, _) = signed_manifest();
        let other = Keypair::from_seed(&[0x24; 32]);
        assert!(!verify_manifest(&bytes, &signature, &other.public_key()));
    }

    #[test]
    fn test_wrong_signature_length_fails() {
        let (bytes, signature, keypair) = signed_manifest();
        assert!(!verify_manifest(&bytes, &signature[..63], &keypair.public_key()));
        assert!(!verify_manifest(&bytes, &[], &keypair.public_key()));
    }

    #[test]
    fn test_unusable_public_key_fails() {
        let (bytes, signature, _) = signed_manifest();
        let bad = Ed25519PublicKey([0xff; 32]);
        assert!(!verify_manifest(&bytes, &signature, &bad));
    }

    #[test]
    fn test_verify_shard() {
        let entry = ManifestEntry::for_bytes("shard_A.bin", b"alpha");
        assert!(verify_shard(b"alpha", &entry));
        assert!(!verify_shard(b"alphA", &entry));
        assert!(!verify_shard(b"alph", &entry));
    }

    #[test]
    fn test_check_shard_reports_reason() {
        let entry = ManifestEntry::for_bytes("shard_A.bin", b"alpha");
        assert!(matches!(
            check_shard(b"alpha!", &entry),
            Err(CoreError::LengthMismatch { expected: 5, actual: 6 })
        ));
        assert!(matches!(
            check_shard(b"alphb", &entry),
            Err(CoreError::DigestMismatch { .. })
        ));
    }

    proptest! {
        #[test]
        fn test_manifest_bit_flip_fails(index in any::<prop::sample::Index>(), bit in 0u8..8) {
            let (mut bytes, signature, keypair) = signed_manifest();
            let i = index.index(bytes.len());
            bytes[i] ^= 1 << bit;
            prop_assert!(!verify_manifest(&bytes, &signature, &keypair.public_key()));
        }

        #[test]
        fn test_signature_bit_flip_fails(index in 0usize..64, bit in 0u8..8) {
            let (bytes, mut signature, keypair) = signed_manifest();
            signature[index] ^= 1 << bit;
            prop_assert!(!verify_manifest(&bytes, &signature, &keypair.public_key()));
        }

        #[test]
        fn test_shard_bit_flip_fails(index in any::<prop::sample::Index>(), bit in 0u8..8) {
            let mut shard = b"some shard bytes".to_vec();
            let entry = ManifestEntry::for_bytes("shard_S.bin", &shard);
            let i = index.index(shard.len());
            shard[i] ^= 1 << bit;
            prop_assert!(!verify_shard(&shard, &entry));
        }
    }
}
