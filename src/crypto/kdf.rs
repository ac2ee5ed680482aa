use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use super::{KEY_LEN, SALT_LEN, secure_random};
use crate::error::VaultError;

/// Argon2id cost profile.
///
/// The profile is not recorded inside an archive, so an archive can only be
/// imported with the same profile it was exported with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    mem_cost_kib: u32,
    time_cost: u32,
    parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::moderate()
    }
}

impl KdfParams {
    /// The fixed "moderate" profile: 256 MiB, 3 passes, 1 lane.
    pub const fn moderate() -> Self {
        Self {
            mem_cost_kib: 256 * 1024,
            time_cost: 3,
            parallelism: 1,
        }
    }

    pub fn new(mem_cost_kib: u32, time_cost: u32, parallelism: u32) -> Result<Self, VaultError> {
        let params = Self {
            mem_cost_kib,
            time_cost,
            parallelism,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn mem_cost_kib(&self) -> u32 {
        self.mem_cost_kib
    }

    pub fn time_cost(&self) -> u32 {
        self.time_cost
    }

    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }

    pub fn validate(&self) -> Result<(), VaultError> {
        let invalid = |msg: &str| Err(VaultError::KeyDerivation(msg.to_string()));

        if self.time_cost < 1 {
            return invalid("argon2 time cost must be >= 1");
        }
        if self.parallelism < 1 {
            return invalid("argon2 parallelism must be >= 1");
        }
        if self.mem_cost_kib < 8 * self.parallelism {
            return invalid("argon2 memory cost must be at least 8 * parallelism");
        }
        Ok(())
    }
}

/// Generate a fresh salt for one archive.
pub fn generate_salt() -> Result<[u8; SALT_LEN], VaultError> {
    let mut salt = [0u8; SALT_LEN];
    secure_random(&mut salt)?;
    Ok(salt)
}

/// Derive a 256-bit key from a passphrase with Argon2id v1.3.
///
/// Deterministic for a given passphrase, salt and profile. Fails only when
/// the profile is invalid or the memory cost cannot be allocated.
pub fn derive_key(
    passphrase: &str,
    salt: &[u8; SALT_LEN],
    kdf: KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
    kdf.validate()?;

    let params = Params::new(
        kdf.mem_cost_kib,
        kdf.time_cost,
        kdf.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| VaultError::KeyDerivation(format!("argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key[..])
        .map_err(|e| VaultError::KeyDerivation(format!("argon2: {e}")))?;

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> KdfParams {
        KdfParams::new(1024, 1, 1).unwrap()
    }

    #[test]
    fn kdf_is_deterministic() {
        let salt = [42u8; SALT_LEN];

        let k1 = derive_key("password", &salt, light()).unwrap();
        let k2 = derive_key("password", &salt, light()).unwrap();

        assert_eq!(*k1, *k2);
    }

    #[test]
    fn different_salt_gives_different_key() {
        let k1 = derive_key("password", &[1u8; SALT_LEN], light()).unwrap();
        let k2 = derive_key("password", &[2u8; SALT_LEN], light()).unwrap();

        assert_ne!(*k1, *k2);
    }

    #[test]
    fn kdf_params_affect_output() {
        let salt = [7u8; SALT_LEN];

        let k1 = derive_key("pw", &salt, KdfParams::new(1024, 1, 1).unwrap()).unwrap();
        let k2 = derive_key("pw", &salt, KdfParams::new(2048, 1, 1).unwrap()).unwrap();

        assert_ne!(*k1, *k2);
    }

    #[test]
    fn kdf_invalid_params_fail_gracefully() {
        assert!(matches!(
            KdfParams::new(0, 0, 0),
            Err(VaultError::KeyDerivation(_))
        ));
        assert!(KdfParams::new(8, 1, 2).is_err());
    }

    #[test]
    fn default_profile_is_moderate() {
        let kdf = KdfParams::default();
        assert_eq!(kdf.mem_cost_kib(), 262_144);
        assert_eq!(kdf.time_cost(), 3);
        assert_eq!(kdf.parallelism(), 1);
    }

    #[test]
    fn salts_are_fresh() {
        assert_ne!(generate_salt().unwrap(), generate_salt().unwrap());
    }
}
